/// Samples buffered during one capture session, mono f32 in [-1.0, 1.0]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedAudio {
    pub sample_rate: u32,
    pub chunks: Vec<Vec<f32>>,
}

impl CapturedAudio {
    pub fn new(sample_rate: u32, chunks: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            chunks,
        }
    }

    /// True when no samples arrived during the session
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Vec::is_empty)
    }

    pub fn samples(&self) -> Vec<f32> {
        self.chunks.concat()
    }

    pub fn duration_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        let len: usize = self.chunks.iter().map(Vec::len).sum();
        (len as f32 / self.sample_rate as f32) * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chunks_count_as_empty() {
        assert!(CapturedAudio::default().is_empty());
        assert!(CapturedAudio::new(16000, vec![vec![], vec![]]).is_empty());
        assert!(!CapturedAudio::new(16000, vec![vec![], vec![0.1]]).is_empty());
    }

    #[test]
    fn test_duration_and_concat() {
        let audio = CapturedAudio::new(16000, vec![vec![0.0; 8000], vec![0.5; 8000]]);
        assert_eq!(audio.duration_ms(), 1000.0);
        assert_eq!(audio.samples().len(), 16000);
        assert_eq!(audio.samples()[8000], 0.5);
    }
}
