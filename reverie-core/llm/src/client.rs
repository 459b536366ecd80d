use futures::stream::Stream;
use futures::{
    StreamExt,
    stream::{self},
};
use reqwest::header::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt::Debug, pin::Pin};
use tracing::{Level, event, instrument, warn};

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Remove every complete line from `buffer` and return them in order.
/// A trailing partial line stays in the buffer until its newline arrives, so
/// multi-byte characters split across network chunks decode intact.
pub(crate) fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut last_newline_pos = 0;

    for idx in buffer
        .iter()
        .enumerate()
        .filter_map(|(idx, byte)| (*byte == b'\n').then_some(idx))
    {
        let line = &buffer[last_newline_pos..idx];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        lines.push(String::from_utf8_lossy(line).into_owned());
        last_newline_pos = idx + 1;
    }

    buffer.drain(..last_newline_pos);
    lines
}

/// Turn the lines of one network chunk into parsed events.
fn parse_lines<T, F>(lines: Vec<String>, process: &F) -> Vec<anyhow::Result<T>>
where
    T: DeserializeOwned,
    F: Fn(&str) -> Option<&str>,
{
    let mut events = Vec::new();
    for line in &lines {
        let Some(processed) = process(line) else {
            continue;
        };
        if processed.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(processed) {
            Ok(parsed) => events.push(Ok(parsed)),
            Err(e) => warn!(line = %processed, error = %e, "Skipping unparseable stream line"),
        }
    }
    events
}

/// Turn a non-2xx response into an error carrying the status and body
async fn ensure_success(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Err(anyhow::anyhow!("Request failed with status {}: {}", status, body))
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
    let text = ensure_success(response).await?.text().await?;
    event!(Level::TRACE, response = text);
    Ok(serde_json::from_str::<T>(&text)?)
}

impl Client {
    pub fn with_headers(headers: HeaderMap) -> anyhow::Result<Self> {
        Ok(Client {
            client: reqwest::Client::builder().default_headers(headers).build()?,
        })
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get<U, T>(&self, url: U) -> anyhow::Result<T>
    where
        U: reqwest::IntoUrl + Debug,
        T: DeserializeOwned,
    {
        decode_json(self.client.get(url).send().await?).await
    }

    #[instrument(level = "trace", skip(self, request))]
    pub async fn post<U, S, T>(&self, url: U, request: &S) -> anyhow::Result<T>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        decode_json(self.client.post(url).json(request).send().await?).await
    }

    /// POST and read the response body as a line-oriented event stream.
    /// `process` picks the JSON payload out of each line (or skips the line).
    #[instrument(level = "trace", skip(self, request, process))]
    pub async fn post_stream<U, S, F, T>(
        &self,
        url: U,
        request: &S,
        process: F,
    ) -> anyhow::Result<BoxedStream<anyhow::Result<T>>>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned + Send + 'static,
        F: Fn(&str) -> Option<&str> + 'static + Send,
    {
        let response = ensure_success(self.client.post(url).json(request).send().await?).await?;

        let events = response
            .bytes_stream()
            .scan(Vec::new(), move |buffer, chunk| {
                let events = match chunk {
                    Ok(chunk) => {
                        buffer.extend_from_slice(&chunk);
                        parse_lines(drain_lines(buffer), &process)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!("Error reading stream chunk: {}", e))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(events))
    }
}
