use std::collections::HashMap;
use std::fmt::Debug;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::client_input::ClientInput;
use crate::error::{Error, ErrorDetails, TensorZeroError};
use crate::tool::DynamicToolParams;
use crate::types::{ContentBlockChatOutput, ContentBlockChunk, FinishReason, JsonInferenceOutput, Usage};

/// The body of a request to the gateway's inference endpoint.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ClientInferenceParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<Uuid>,
    pub input: ClientInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    pub params: InferenceParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dryrun: Option<bool>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(flatten)]
    pub dynamic_tool_params: DynamicToolParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    pub include_original_response: bool,
}

/// Inference-time overrides for variant-level generation parameters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceParams {
    #[serde(default)]
    pub chat_completion: ChatCompletionInferenceParams,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatCompletionInferenceParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_mode: Option<JsonMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonMode {
    Off,
    On,
    Strict,
    ImplicitTool,
}

/// A fully-assembled inference response.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InferenceResponse {
    Chat(ChatInferenceResponse),
    Json(JsonInferenceResponse),
}

impl InferenceResponse {
    pub fn inference_id(&self) -> Uuid {
        match self {
            InferenceResponse::Chat(c) => c.inference_id,
            InferenceResponse::Json(j) => j.inference_id,
        }
    }

    pub fn episode_id(&self) -> Uuid {
        match self {
            InferenceResponse::Chat(c) => c.episode_id,
            InferenceResponse::Json(j) => j.episode_id,
        }
    }

    pub fn variant_name(&self) -> &str {
        match self {
            InferenceResponse::Chat(c) => &c.variant_name,
            InferenceResponse::Json(j) => &j.variant_name,
        }
    }

    pub fn usage(&self) -> Usage {
        match self {
            InferenceResponse::Chat(c) => c.usage,
            InferenceResponse::Json(j) => j.usage,
        }
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self {
            InferenceResponse::Chat(c) => c.finish_reason,
            InferenceResponse::Json(j) => j.finish_reason,
        }
    }

    /// The output of the response as a serialized JSON string (the chat
    /// content blocks, or the raw JSON output).
    pub fn get_serialized_output(&self) -> Result<String, Error> {
        match self {
            InferenceResponse::Chat(c) => serde_json::to_string(&c.content).map_err(|e| {
                Error::new(ErrorDetails::Serialization {
                    message: format!("Error serializing chat response content: {e}"),
                })
            }),
            InferenceResponse::Json(j) => serde_json::to_string(&j.output).map_err(|e| {
                Error::new(ErrorDetails::Serialization {
                    message: format!("Error serializing json response output: {e}"),
                })
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChatInferenceResponse {
    pub inference_id: Uuid,
    pub episode_id: Uuid,
    pub variant_name: String,
    pub content: Vec<ContentBlockChatOutput>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JsonInferenceResponse {
    pub inference_id: Uuid,
    pub episode_id: Uuid,
    pub variant_name: String,
    pub output: JsonInferenceOutput,
    #[serde(default)]
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// A single chunk of a streaming inference response.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InferenceResponseChunk {
    Chat(ChatInferenceResponseChunk),
    Json(JsonInferenceResponseChunk),
}

impl InferenceResponseChunk {
    pub fn inference_id(&self) -> Uuid {
        match self {
            InferenceResponseChunk::Chat(c) => c.inference_id,
            InferenceResponseChunk::Json(j) => j.inference_id,
        }
    }

    pub fn episode_id(&self) -> Uuid {
        match self {
            InferenceResponseChunk::Chat(c) => c.episode_id,
            InferenceResponseChunk::Json(j) => j.episode_id,
        }
    }

    pub fn variant_name(&self) -> &str {
        match self {
            InferenceResponseChunk::Chat(c) => &c.variant_name,
            InferenceResponseChunk::Json(j) => &j.variant_name,
        }
    }

    pub fn usage(&self) -> Option<&Usage> {
        match self {
            InferenceResponseChunk::Chat(c) => c.usage.as_ref(),
            InferenceResponseChunk::Json(j) => j.usage.as_ref(),
        }
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self {
            InferenceResponseChunk::Chat(c) => c.finish_reason,
            InferenceResponseChunk::Json(j) => j.finish_reason,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChatInferenceResponseChunk {
    pub inference_id: Uuid,
    pub episode_id: Uuid,
    pub variant_name: String,
    pub content: Vec<ContentBlockChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JsonInferenceResponseChunk {
    pub inference_id: Uuid,
    pub episode_id: Uuid,
    pub variant_name: String,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

pub type InferenceStream =
    Pin<Box<dyn Stream<Item = Result<InferenceResponseChunk, TensorZeroError>> + Send>>;

/// The result of `Client::inference`: a complete response, or a stream of
/// chunks when `stream: Some(true)` was requested.
pub enum InferenceOutput {
    NonStreaming(InferenceResponse),
    Streaming(InferenceStream),
}

impl Debug for InferenceOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceOutput::NonStreaming(response) => {
                write!(f, "NonStreaming({response:?})")
            }
            InferenceOutput::Streaming(_) => write!(f, "Streaming(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextChunk, Text};
    use serde_json::json;

    #[test]
    fn test_inference_response_untagged_decoding() {
        let chat: InferenceResponse = serde_json::from_value(json!({
            "inference_id": "01920c75-d114-7f80-9f93-a2cbd1a37496",
            "episode_id": "01920c75-d114-7f80-9f93-b2dca6b9a0f4",
            "variant_name": "baseline",
            "content": [{"type": "text", "text": "Tokyo"}],
            "usage": {"input_tokens": 10, "output_tokens": 2},
            "finish_reason": "stop"
        }))
        .unwrap();
        let InferenceResponse::Chat(chat) = chat else {
            panic!("Expected chat response");
        };
        assert_eq!(
            chat.content,
            vec![ContentBlockChatOutput::Text(Text {
                text: "Tokyo".to_string()
            })]
        );
        assert_eq!(chat.usage.input_tokens, Some(10));

        let json: InferenceResponse = serde_json::from_value(json!({
            "inference_id": "01920c75-d114-7f80-9f93-a2cbd1a37496",
            "episode_id": "01920c75-d114-7f80-9f93-b2dca6b9a0f4",
            "variant_name": "baseline",
            "output": {"raw": "{\"answer\":\"Tokyo\"}", "parsed": {"answer": "Tokyo"}},
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        let InferenceResponse::Json(json) = json else {
            panic!("Expected json response");
        };
        assert_eq!(json.output.parsed, Some(json!({"answer": "Tokyo"})));
        assert_eq!(json.finish_reason, None);
    }

    #[test]
    fn test_chunk_untagged_decoding() {
        let chunk: InferenceResponseChunk = serde_json::from_value(json!({
            "inference_id": "01920c75-d114-7f80-9f93-a2cbd1a37496",
            "episode_id": "01920c75-d114-7f80-9f93-b2dca6b9a0f4",
            "variant_name": "baseline",
            "content": [{"type": "text", "id": "0", "text": "Tok"}]
        }))
        .unwrap();
        let InferenceResponseChunk::Chat(chunk) = chunk else {
            panic!("Expected chat chunk");
        };
        assert_eq!(
            chunk.content,
            vec![ContentBlockChunk::Text(TextChunk {
                id: "0".to_string(),
                text: "Tok".to_string()
            })]
        );

        let chunk: InferenceResponseChunk = serde_json::from_value(json!({
            "inference_id": "01920c75-d114-7f80-9f93-a2cbd1a37496",
            "episode_id": "01920c75-d114-7f80-9f93-b2dca6b9a0f4",
            "variant_name": "baseline",
            "raw": "{\"ans",
            "usage": {"input_tokens": 10, "output_tokens": null}
        }))
        .unwrap();
        assert!(matches!(chunk, InferenceResponseChunk::Json(_)));
    }

    #[test]
    fn test_params_serialization_shape() {
        let params = ClientInferenceParams {
            function_name: Some("generate_haiku".to_string()),
            stream: Some(true),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["function_name"], json!("generate_haiku"));
        assert_eq!(value["stream"], json!(true));
        // Skipped options must not appear on the wire
        assert!(value.get("model_name").is_none());
        assert!(value.get("episode_id").is_none());
        assert!(value.get("tags").is_none());
        // Dynamic tool params flatten into the top level
        assert!(value.get("dynamic_tool_params").is_none());
        assert_eq!(value["include_original_response"], json!(false));
    }
}
