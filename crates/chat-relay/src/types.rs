//! Wire types for both sides of the relay.
//!
//! Inbound: the chat request posted by the client.
//! Upstream: Ollama's `/api/chat` request body and its newline-delimited
//! JSON records.
//! Downstream: OpenAI-style `chat.completion.chunk` frames sent as SSE.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `object` tag carried by every downstream chunk.
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// Literal payload of the end-of-stream frame.
pub const DONE_TOKEN: &str = "[DONE]";

/// A message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message as stored by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    /// Client-side bookkeeping; never forwarded upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub system_prompt: String,
}

/// A message in Ollama's chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: Role,
    pub content: String,
}

/// Request body for Ollama's `/api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub stream: bool,
}

impl UpstreamRequest {
    /// Build a streaming request, prepending `system_prompt` as a system
    /// message ahead of the stored conversation.
    pub fn from_chat(model: impl Into<String>, req: &ChatRequest) -> Self {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        messages.push(UpstreamMessage {
            role: Role::System,
            content: req.system_prompt.clone(),
        });
        messages.extend(req.messages.iter().map(|m| UpstreamMessage {
            role: m.role,
            content: m.content.clone(),
        }));

        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

/// One decoded line of Ollama's streaming output.
///
/// Only the fields the relay reads are kept; everything else (`model`,
/// `eval_count`, ...) is ignored. Fields that are missing or have an
/// unexpected JSON type fall back to their defaults instead of rejecting
/// the whole record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamRecord {
    pub created: i64,
    pub content: String,
    pub done: bool,
    /// `Some` whenever the key is present, including `"error": null`.
    pub error: Option<Value>,
}

impl UpstreamRecord {
    /// Read a record out of a decoded line. `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };

        Some(Self {
            created: map.get("created").and_then(Value::as_i64).unwrap_or(0),
            content: map
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            done: map.get("done").is_some_and(truthy),
            error: map.remove("error"),
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ollama sends `done` as a bool; other JSON values follow the usual
/// truthiness rules (non-zero, non-empty).
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// An OpenAI-style streaming chunk.
///
/// Field order matters: it is the order of keys on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownstreamChunk {
    pub id: String,
    pub choices: Vec<Choice>,
    pub created: i64,
    pub model: String,
    pub object: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub content: String,
    pub role: Role,
}

/// One event written to the downstream SSE body.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Chunk(DownstreamChunk),
    /// End-of-stream marker (`data: [DONE]`).
    Done,
    /// Error envelope (`data: {"error": ...}`).
    Error(Value),
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a Value,
}

impl Frame {
    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error(Value::String(message.into()))
    }

    /// `Done` and `Error` end the stream; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Done | Frame::Error(_))
    }

    /// Serialize as an SSE event: `data: <payload>\n\n`.
    pub fn encode(&self) -> String {
        let payload = match self {
            Frame::Chunk(chunk) => to_json(chunk),
            Frame::Done => DONE_TOKEN.to_string(),
            Frame::Error(error) => to_json(&ErrorEnvelope { error }),
        };
        format!("data: {}\n\n", payload)
    }
}

// Chunks and envelopes hold only strings, integers and `Value`s.
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize frame payload");
        "{}".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_chat_prepends_system_prompt() {
        let req = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: Role::User,
                    content: "hello".to_string(),
                    timestamp: Some(1_700_000_000),
                },
                ChatMessage {
                    role: Role::Assistant,
                    content: "hi".to_string(),
                    timestamp: None,
                },
            ],
            system_prompt: "be brief".to_string(),
        };

        let out = UpstreamRequest::from_chat("mistral", &req);
        let v = serde_json::to_value(&out).unwrap();

        assert_eq!(
            v,
            json!({
                "model": "mistral",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "hi"}
                ],
                "stream": true
            })
        );
        // The stored conversation is left as-is.
        assert_eq!(req.messages.len(), 2);
    }

    #[test]
    fn from_chat_keeps_empty_system_prompt() {
        let req = ChatRequest {
            messages: vec![],
            system_prompt: String::new(),
        };
        let out = UpstreamRequest::from_chat("mistral", &req);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].role, Role::System);
    }

    #[test]
    fn chat_request_rejects_unknown_role() {
        let body = r#"{"messages":[{"role":"tool","content":"x"}],"system_prompt":""}"#;
        assert!(serde_json::from_str::<ChatRequest>(body).is_err());
    }

    #[test]
    fn record_defaults_missing_fields() {
        let rec = UpstreamRecord::from_value(json!({})).unwrap();
        assert_eq!(rec.created, 0);
        assert_eq!(rec.content(), "");
        assert!(!rec.done);
        assert!(rec.error.is_none());
    }

    #[test]
    fn record_treats_null_error_as_present() {
        let rec = UpstreamRecord::from_value(json!({"error": null})).unwrap();
        assert_eq!(rec.error, Some(Value::Null));
    }

    #[test]
    fn record_tolerates_mistyped_fields() {
        let rec = UpstreamRecord::from_value(json!({
            "created": null,
            "message": {"content": null},
            "done": true
        }))
        .unwrap();
        assert_eq!(rec.created, 0);
        assert_eq!(rec.content(), "");
        assert!(rec.done);

        let rec = UpstreamRecord::from_value(json!({"message": "flat", "done": "yes"})).unwrap();
        assert_eq!(rec.content(), "");
        assert!(rec.done);

        let rec = UpstreamRecord::from_value(json!({"done": 0})).unwrap();
        assert!(!rec.done);
    }

    #[test]
    fn record_requires_an_object() {
        assert!(UpstreamRecord::from_value(json!([1, 2])).is_none());
        assert!(UpstreamRecord::from_value(json!("done")).is_none());
        assert!(UpstreamRecord::from_value(Value::Null).is_none());
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unsupported"))
        }
    }

    #[test]
    fn to_json_falls_back_to_empty_object() {
        assert_eq!(to_json(&Unserializable), "{}");
    }

    #[test]
    fn encode_done_and_error_frames() {
        assert_eq!(Frame::Done.encode(), "data: [DONE]\n\n");
        assert_eq!(
            Frame::error("model not found").encode(),
            "data: {\"error\":\"model not found\"}\n\n"
        );
        assert!(Frame::Done.is_terminal());
        assert!(Frame::error("x").is_terminal());
    }
}
