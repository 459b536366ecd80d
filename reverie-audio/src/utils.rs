/// Sample rate of every encoded voice note
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Resample audio to 16kHz by nearest-sample decimation
pub fn resample_to_16khz(samples: &[f32], original_sample_rate: u32) -> Vec<f32> {
    if original_sample_rate == TARGET_SAMPLE_RATE || original_sample_rate == 0 {
        return samples.to_vec();
    }

    let ratio = original_sample_rate as f32 / TARGET_SAMPLE_RATE as f32;
    let output_len = (samples.len() as f32 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_index = (i as f32 * ratio) as usize;
        if src_index < samples.len() {
            output.push(samples[src_index]);
        } else {
            output.push(0.0);
        }
    }

    output
}

/// Average interleaved frames down to one channel
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
