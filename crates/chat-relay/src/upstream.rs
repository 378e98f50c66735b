//! Streaming client for Ollama's `/api/chat`.
//!
//! Ollama answers a streaming chat request with newline-delimited JSON. This
//! module only deals with transport and line framing; decoding the records
//! is left to [`crate::translation`].

use crate::config::RelayConfig;
use crate::error::UpstreamError;
use crate::types::UpstreamRequest;
use anyhow::{Context, Result};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Lazy sequence of raw upstream lines.
///
/// Dropping it drops the underlying response, which releases the
/// connection.
pub type UpstreamLines = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
}

impl UpstreamClient {
    /// Build a client for `config.backend_url`.
    ///
    /// Generation can stall for a long time between tokens, so there is no
    /// request or read timeout. The connect phase is bounded only when
    /// `connect_timeout_secs` is set.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("failed to build reqwest client")?;

        Ok(Self::with_client(client, config.backend_url.clone()))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `request` and return the response body as lines.
    ///
    /// Connection failures are returned as-is; there is no retry. A non-2xx
    /// status is not treated as a failure: Ollama reports errors such as an
    /// unknown model as a JSON body, which the translator relays.
    pub async fn open(&self, request: &UpstreamRequest) -> Result<UpstreamLines, UpstreamError> {
        let body = serde_json::to_vec(request)?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(UpstreamError::Connect)?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, url = %self.url, "upstream stream opened");
        } else {
            warn!(%status, url = %self.url, "upstream returned non-success status");
        }

        Ok(Box::pin(lines(response.bytes_stream())))
    }
}

/// Split a byte stream into lines.
///
/// Only the trailing partial line is buffered. Lines end at `\n`, a
/// trailing `\r` is dropped and invalid UTF-8 is replaced. Blank lines are
/// passed through. A transport error is yielded once and ends the stream.
pub fn lines<S, B, E>(body: S) -> impl Stream<Item = Result<String, UpstreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<UpstreamError> + Send,
{
    stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            // Bytes before `scan` are known to hold no newline.
            let scan = buffer.len();
            buffer.extend_from_slice(chunk.as_ref());

            let mut start = 0;
            let mut from = scan;
            while let Some(pos) = buffer[from..].iter().position(|b| *b == b'\n') {
                let end = from + pos;
                let line = decode(&buffer[start..end]);
                start = end + 1;
                from = start;
                yield Ok(line);
            }
            buffer.drain(..start);
        }

        if !buffer.is_empty() {
            yield Ok(decode(&buffer));
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    type Chunk = Result<&'static [u8], UpstreamError>;

    fn ok(bytes: &'static [u8]) -> Chunk {
        Ok(bytes)
    }

    async fn collect(chunks: Vec<Chunk>) -> Vec<Result<String, String>> {
        lines(stream::iter(chunks))
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn splits_lines_across_chunk_boundaries() {
        let out = collect(vec![ok(b"{\"a\":1}\n{\"b\""), ok(b":2}\n\n{\"c\":3}\r\n")]).await;

        assert_eq!(
            out,
            vec![
                Ok("{\"a\":1}".to_string()),
                Ok("{\"b\":2}".to_string()),
                Ok(String::new()),
                Ok("{\"c\":3}".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn yields_unterminated_tail_at_eof() {
        let out = collect(vec![ok(b"first\nsecond")]).await;
        assert_eq!(out, vec![Ok("first".to_string()), Ok("second".to_string())]);
    }

    #[tokio::test]
    async fn multibyte_chars_survive_chunk_split() {
        const TEXT: &[u8] = "h\u{e9}llo\n".as_bytes();

        // Split inside the two-byte `é`.
        let out = collect(vec![ok(&TEXT[..2]), ok(&TEXT[2..])]).await;
        assert_eq!(out, vec![Ok("h\u{e9}llo".to_string())]);
    }

    #[tokio::test]
    async fn many_lines_in_one_chunk() {
        let body: String = (0..2000).map(|i| format!("{{\"n\":{i}}}\n")).collect();
        let body: &'static [u8] = Box::leak(body.into_bytes().into_boxed_slice());

        let out = collect(vec![ok(body), ok(b"{\"n\":\"tail\"}")]).await;

        assert_eq!(out.len(), 2001);
        assert_eq!(out[0], Ok("{\"n\":0}".to_string()));
        assert_eq!(out[1999], Ok("{\"n\":1999}".to_string()));
        assert_eq!(out[2000], Ok("{\"n\":\"tail\"}".to_string()));
    }

    #[tokio::test]
    async fn error_ends_the_stream() {
        let out = collect(vec![
            ok(b"one\n"),
            Err(UpstreamError::Encode(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            )),
            ok(b"two\n"),
        ])
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("one".to_string()));
        assert!(out[1].is_err());
    }
}
