//! Streaming conversion (NDJSON -> SSE).
//!
//! Ollama streams a chat response as one JSON record per line, ending with a
//! record carrying `done: true`. Clients expect OpenAI-style
//! `chat.completion.chunk` events terminated by `data: [DONE]`. This module
//! reads the upstream lines one at a time and yields [`Frame`]s.
//!
//! Every stream produced here ends with at most one terminal frame: either
//! the end-of-stream marker or an error envelope, never both. Nothing is
//! read from upstream after a terminal frame.

use crate::error::UpstreamError;
use crate::translation::{decode_line, frames_for_record, LineOutcome};
use crate::types::{ChatRequest, Frame, UpstreamRequest};
use crate::upstream::UpstreamClient;
use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{debug, error};

/// Translate upstream lines into downstream frames.
///
/// The next line is only pulled once the previous frame has been taken by
/// the consumer, so a slow client slows the backend down instead of
/// buffering output. Dropping the returned stream drops `lines`.
pub fn translate<S>(lines: S, model: String) -> impl Stream<Item = Frame> + Send
where
    S: Stream<Item = Result<String, UpstreamError>> + Send + 'static,
{
    stream! {
        let mut lines = Box::pin(lines);

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "upstream stream failed");
                    yield Frame::error(e.cause_text());
                    return;
                }
            };

            let record = match decode_line(&line) {
                LineOutcome::Record(record) => record,
                LineOutcome::Skip => continue,
            };

            for frame in frames_for_record(record, &model) {
                let terminal = frame.is_terminal();
                if terminal {
                    debug!(frame = ?frame, "terminal frame");
                }
                yield frame;
                if terminal {
                    return;
                }
            }
        }

        // Upstream closed without `done` or `error`: the stream just ends.
        debug!("upstream closed without a completion record");
    }
}

/// Full pipeline for one chat request.
///
/// The upstream connection is opened on first poll. If it cannot be opened,
/// the stream yields a single error envelope carrying the cause.
pub fn relay(
    client: UpstreamClient,
    request: ChatRequest,
    model: String,
) -> impl Stream<Item = Frame> + Send {
    stream! {
        let upstream_request = UpstreamRequest::from_chat(model.clone(), &request);
        drop(request);

        let lines = match client.open(&upstream_request).await {
            Ok(lines) => lines,
            Err(e) => {
                error!(error = %e, url = client.url(), "failed to reach inference backend");
                yield Frame::error(e.cause_text());
                return;
            }
        };
        drop(upstream_request);

        let mut frames = Box::pin(translate(lines, model));
        while let Some(frame) = frames.next().await {
            yield frame;
        }
    }
}
