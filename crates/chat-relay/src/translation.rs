//! Ollama record -> OpenAI chunk translation.
//!
//! This module is pure: it maps one upstream line to the frames it produces
//! and never touches I/O. The streaming state machine in
//! [`crate::streaming`] is built on top of it.

use crate::types::{Choice, Delta, DownstreamChunk, Frame, Role, UpstreamRecord, CHUNK_OBJECT};
use serde_json::Value;

/// `finish_reason` reported on the chunk built from a `done: true` record.
pub const FINISH_STOP: &str = "stop";

/// Result of decoding a single upstream line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Blank line, or a line that is not a JSON object.
    Skip,
    Record(UpstreamRecord),
}

/// Decode one upstream line.
///
/// Malformed lines are not errors: a partially delivered line must not kill
/// the stream, so anything that is not a JSON object is skipped. Once a line
/// is an object it is always a record; odd field types fall back to defaults.
pub fn decode_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Skip;
    }

    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, line, "skipping malformed upstream line");
            return LineOutcome::Skip;
        }
    };

    match UpstreamRecord::from_value(value) {
        Some(record) => LineOutcome::Record(record),
        None => {
            tracing::debug!(line, "skipping non-object upstream line");
            LineOutcome::Skip
        }
    }
}

/// Build the downstream chunk for a record.
pub fn chunk_from_record(record: &UpstreamRecord, model: &str) -> DownstreamChunk {
    DownstreamChunk {
        id: format!("chat_{}", record.created),
        choices: vec![Choice {
            delta: Delta {
                content: record.content().to_string(),
                role: Role::Assistant,
            },
            finish_reason: record.done.then_some(FINISH_STOP),
        }],
        created: record.created,
        model: model.to_string(),
        object: CHUNK_OBJECT,
    }
}

/// Frames emitted for one decoded record, in order.
///
/// - `error` present: only the error envelope, even if `done` is also set.
/// - `done: true`: the final chunk followed by the end-of-stream marker.
/// - otherwise: a single chunk.
pub fn frames_for_record(record: UpstreamRecord, model: &str) -> Vec<Frame> {
    if let Some(error) = record.error {
        return vec![Frame::Error(error)];
    }

    let chunk = Frame::Chunk(chunk_from_record(&record, model));
    if record.done {
        vec![chunk, Frame::Done]
    } else {
        vec![chunk]
    }
}
