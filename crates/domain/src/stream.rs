use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// The lazy, single-consumption sequence every handler returns.
///
/// Nothing is sent upstream until the stream is first polled. An upstream
/// failure is yielded as an `Err` item, after which the stream ends.
pub type ApiStream = BoxStream<'static, Result<StreamEvent>>;

/// Events emitted during LLM streaming (provider-agnostic).
///
/// Concatenating the `Text` events of one call, in emission order, yields the
/// full response text. Non-streaming calls emit at most one `Text` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of the model's reply.
    Text { text: String },

    /// Token accounting, only emitted when the upstream reports it.
    #[serde(rename_all = "camelCase")]
    Usage { input_tokens: u32, output_tokens: u32 },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text fragment carried by this event, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamEvent::Text { text } => Some(text.as_str()),
            StreamEvent::Usage { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_serializes_with_type_tag() {
        let json = serde_json::to_value(StreamEvent::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn usage_event_uses_camel_case_fields() {
        let json = serde_json::to_value(StreamEvent::Usage {
            input_tokens: 12,
            output_tokens: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "usage", "inputTokens": 12, "outputTokens": 3})
        );
    }

    #[test]
    fn as_text_skips_usage() {
        assert_eq!(StreamEvent::text("a").as_text(), Some("a"));
        let usage = StreamEvent::Usage {
            input_tokens: 1,
            output_tokens: 1,
        };
        assert_eq!(usage.as_text(), None);
    }
}
