use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::tool::ToolCallOutput;

pub mod file;
pub mod streams;

pub use file::{File, FileKind};
pub use streams::{collect_chunks, ContentBlockChunk, TextChunk, ThoughtChunk};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Text {
    pub text: String,
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// The payload of a `{"type": "text", ...}` input content block: either
/// plain text, or structured arguments for a templated function input.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TextKind {
    Text { text: String },
    Arguments { arguments: Map<String, Value> },
}

impl<'de> Deserialize<'de> for TextKind {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let object: Map<String, Value> = Map::deserialize(de)?;
        // Expect exactly one key
        if object.keys().len() != 1 {
            return Err(serde::de::Error::custom(format!(
                "Expected exactly one other key in text content, found {} other keys",
                object.keys().len()
            )));
        }
        let (key, value) = object.into_iter().next().ok_or_else(|| {
            serde::de::Error::custom(
                "Internal error: Failed to get key/value after checking length",
            )
        })?;
        match key.as_str() {
            "text" => Ok(TextKind::Text {
                text: serde_json::from_value(value).map_err(|e| {
                    serde::de::Error::custom(format!("Error deserializing 'text': {e}"))
                })?,
            }),
            "arguments" => Ok(TextKind::Arguments {
                arguments: serde_json::from_value(value).map_err(|e| {
                    serde::de::Error::custom(format!("Error deserializing 'arguments': {e}"))
                })?,
            }),
            _ => Err(serde::de::Error::custom(format!(
                "Unknown key '{key}' in text content"
            ))),
        }
    }
}

/// A chain-of-thought reasoning block.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Thought {
    pub text: Option<String>,
    /// An optional provider-specific signature for the thought.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// When set, this 'Thought' block is only meaningful to providers
    /// matching this type (e.g. `anthropic`).
    #[serde(
        rename = "_internal_provider_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_type: Option<String>,
}

/// A content block in a fully-assembled chat response.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockChatOutput {
    Text(Text),
    ToolCall(ToolCallOutput),
    Thought(Thought),
    /// A provider-specific content block passed through without interpretation.
    Unknown {
        data: Value,
        model_provider_name: Option<String>,
    },
}

/// Token accounting for a single inference. Fields are `None` when the
/// gateway never reported a value for them.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Usage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    StopSequence,
    Length,
    ToolCall,
    ContentFilter,
    Unknown,
}

/// The output of a JSON-mode inference: the raw model text plus the
/// parsed value, when the raw text parsed as valid JSON.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JsonInferenceOutput {
    pub raw: Option<String>,
    pub parsed: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_kind_deserialization() {
        let text: TextKind = serde_json::from_value(json!({"text": "hello"})).unwrap();
        assert_eq!(
            text,
            TextKind::Text {
                text: "hello".to_string()
            }
        );

        let arguments: TextKind =
            serde_json::from_value(json!({"arguments": {"country": "Japan"}})).unwrap();
        let TextKind::Arguments { arguments } = arguments else {
            panic!("Expected arguments");
        };
        assert_eq!(arguments.get("country"), Some(&json!("Japan")));

        let err = serde_json::from_value::<TextKind>(json!({"bad_key": "hello"}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unknown key 'bad_key'"), "Bad error: {err}");

        let err = serde_json::from_value::<TextKind>(json!({"text": "hello", "arguments": {}}))
            .unwrap_err()
            .to_string();
        assert!(
            err.contains("Expected exactly one other key"),
            "Bad error: {err}"
        );
    }

    #[test]
    fn test_content_block_chat_output_tagging() {
        let block: ContentBlockChatOutput =
            serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(
            block,
            ContentBlockChatOutput::Text(Text {
                text: "hi".to_string()
            })
        );

        // Unknown wire tags must fail decoding, never coerce
        assert!(
            serde_json::from_value::<ContentBlockChatOutput>(json!({"type": "video", "data": {}}))
                .is_err()
        );

        let thought: ContentBlockChatOutput = serde_json::from_value(
            json!({"type": "thought", "text": "thinking...", "signature": "sig"}),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&thought).unwrap(),
            json!({"type": "thought", "text": "thinking...", "signature": "sig"})
        );
    }

    #[test]
    fn test_finish_reason_wire_format() {
        assert_eq!(
            serde_json::to_value(FinishReason::StopSequence).unwrap(),
            json!("stop_sequence")
        );
        assert_eq!(
            serde_json::from_value::<FinishReason>(json!("tool_call")).unwrap(),
            FinishReason::ToolCall
        );
    }

    #[test]
    fn test_usage_default_is_absent() {
        let usage = Usage::default();
        assert_eq!(usage.input_tokens, None);
        assert_eq!(usage.output_tokens, None);
    }
}
