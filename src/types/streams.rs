use std::cmp::Ordering;

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ErrorDetails, TensorZeroError};
use crate::inference::{
    ChatInferenceResponse, InferenceResponse, InferenceResponseChunk, JsonInferenceResponse,
};
use crate::tool::{ToolCallChunk, ToolCallOutput};
use crate::types::{ContentBlockChatOutput, FinishReason, JsonInferenceOutput, Text, Thought, Usage};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TextChunk {
    pub id: String,
    pub text: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ThoughtChunk {
    pub id: String,
    pub text: Option<String>,
    pub signature: Option<String>,
    /// See `Thought.provider_type`
    #[serde(
        rename = "_internal_provider_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_type: Option<String>,
}

/// An incremental fragment of a content block. All fragments of one
/// block share an `id`; the variant at a given `id` never changes
/// within a well-formed stream.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockChunk {
    Text(TextChunk),
    ToolCall(ToolCallChunk),
    Thought(ThoughtChunk),
}

/// Accumulates the fragments of a single content block. The variant is
/// fixed by the first chunk observed at the block's id.
enum ContentBlockBuilder {
    Text(Text),
    ToolCall {
        id: String,
        raw_name: String,
        raw_arguments: String,
    },
    Thought(Thought),
}

impl ContentBlockBuilder {
    fn kind(&self) -> &'static str {
        match self {
            ContentBlockBuilder::Text(_) => "text",
            ContentBlockBuilder::ToolCall { .. } => "tool_call",
            ContentBlockBuilder::Thought(_) => "thought",
        }
    }

    fn finish(self) -> ContentBlockChatOutput {
        match self {
            ContentBlockBuilder::Text(text) => ContentBlockChatOutput::Text(text),
            ContentBlockBuilder::ToolCall {
                id,
                raw_name,
                raw_arguments,
            } => {
                let arguments = serde_json::from_str(&raw_arguments).ok();
                let name = if raw_name.is_empty() {
                    None
                } else {
                    Some(raw_name.clone())
                };
                ContentBlockChatOutput::ToolCall(ToolCallOutput {
                    arguments,
                    id,
                    name,
                    raw_arguments,
                    raw_name,
                })
            }
            ContentBlockBuilder::Thought(thought) => ContentBlockChatOutput::Thought(thought),
        }
    }
}

fn content_block_mismatch(id: &str, existing: &str, incoming: &str) -> TensorZeroError {
    Error::new(ErrorDetails::InvalidStreamChunk {
        message: format!(
            "Content block `{id}` changed type mid-stream: started as `{existing}`, received `{incoming}`"
        ),
    })
    .into()
}

/// Reassembles a sequence of streaming chunks into the response a
/// non-streaming call would have produced.
///
/// Text, thought, and tool-call fragments concatenate per block id in
/// arrival order; blocks are emitted in ascending id order regardless of
/// the order their first fragments arrived in. Usage is the last
/// reported value per field, and the finish reason is the last reported
/// one. An empty chunk sequence assembles to an empty chat response.
pub fn collect_chunks(
    chunks: Vec<InferenceResponseChunk>,
) -> Result<InferenceResponse, TensorZeroError> {
    let mut inference_id = Uuid::nil();
    let mut episode_id = Uuid::nil();
    let mut variant_name = String::new();
    let mut usage = Usage::default();
    let mut finish_reason: Option<FinishReason> = None;
    let mut builders: IndexMap<String, ContentBlockBuilder> = IndexMap::new();
    let mut raw_json: Option<String> = None;
    // None until the first chunk fixes the response kind
    let mut is_json: Option<bool> = None;

    for (i, chunk) in chunks.into_iter().enumerate() {
        if i == 0 {
            inference_id = chunk.inference_id();
            episode_id = chunk.episode_id();
            variant_name = chunk.variant_name().to_string();
        }
        if let Some(chunk_usage) = chunk.usage() {
            if chunk_usage.input_tokens.is_some() {
                usage.input_tokens = chunk_usage.input_tokens;
            }
            if chunk_usage.output_tokens.is_some() {
                usage.output_tokens = chunk_usage.output_tokens;
            }
        }
        if let Some(chunk_finish_reason) = chunk.finish_reason() {
            finish_reason = Some(chunk_finish_reason);
        }
        match chunk {
            InferenceResponseChunk::Chat(chat_chunk) => {
                if is_json == Some(true) {
                    return Err(Error::new(ErrorDetails::InvalidStreamChunk {
                        message: "Received a chat chunk in a JSON response stream".to_string(),
                    })
                    .into());
                }
                is_json = Some(false);
                for content in chat_chunk.content {
                    apply_content_chunk(&mut builders, content)?;
                }
            }
            InferenceResponseChunk::Json(json_chunk) => {
                if is_json == Some(false) {
                    return Err(Error::new(ErrorDetails::InvalidStreamChunk {
                        message: "Received a JSON chunk in a chat response stream".to_string(),
                    })
                    .into());
                }
                is_json = Some(true);
                raw_json.get_or_insert_with(String::new).push_str(&json_chunk.raw);
            }
        }
    }

    if is_json == Some(true) {
        let parsed = raw_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        return Ok(InferenceResponse::Json(JsonInferenceResponse {
            inference_id,
            episode_id,
            variant_name,
            output: JsonInferenceOutput {
                raw: raw_json,
                parsed,
            },
            usage,
            original_response: None,
            finish_reason,
        }));
    }

    builders.sort_by(|id_a, _, id_b, _| compare_block_ids(id_a, id_b));
    let content = builders
        .into_values()
        .map(ContentBlockBuilder::finish)
        .collect();
    Ok(InferenceResponse::Chat(ChatInferenceResponse {
        inference_id,
        episode_id,
        variant_name,
        content,
        usage,
        original_response: None,
        finish_reason,
    }))
}

fn apply_content_chunk(
    builders: &mut IndexMap<String, ContentBlockBuilder>,
    content: ContentBlockChunk,
) -> Result<(), TensorZeroError> {
    match content {
        ContentBlockChunk::Text(text_chunk) => {
            match builders.entry(text_chunk.id) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    match existing {
                        ContentBlockBuilder::Text(text) => text.text.push_str(&text_chunk.text),
                        other => {
                            let kind = other.kind();
                            return Err(content_block_mismatch(entry.key(), kind, "text"));
                        }
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(ContentBlockBuilder::Text(Text {
                        text: text_chunk.text,
                    }));
                }
            }
        }
        ContentBlockChunk::ToolCall(tool_chunk) => {
            match builders.entry(tool_chunk.id.clone()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    match existing {
                        ContentBlockBuilder::ToolCall {
                            raw_name,
                            raw_arguments,
                            ..
                        } => {
                            if let Some(name_fragment) = tool_chunk.raw_name {
                                raw_name.push_str(&name_fragment);
                            }
                            raw_arguments.push_str(&tool_chunk.raw_arguments);
                        }
                        other => {
                            let kind = other.kind();
                            return Err(content_block_mismatch(entry.key(), kind, "tool_call"));
                        }
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(ContentBlockBuilder::ToolCall {
                        id: tool_chunk.id,
                        raw_name: tool_chunk.raw_name.unwrap_or_default(),
                        raw_arguments: tool_chunk.raw_arguments,
                    });
                }
            }
        }
        ContentBlockChunk::Thought(thought_chunk) => {
            match builders.entry(thought_chunk.id) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    match existing {
                        ContentBlockBuilder::Thought(thought) => {
                            if let Some(text_fragment) = thought_chunk.text {
                                thought
                                    .text
                                    .get_or_insert_with(String::new)
                                    .push_str(&text_fragment);
                            }
                            if let Some(signature_fragment) = thought_chunk.signature {
                                thought
                                    .signature
                                    .get_or_insert_with(String::new)
                                    .push_str(&signature_fragment);
                            }
                        }
                        other => {
                            let kind = other.kind();
                            return Err(content_block_mismatch(entry.key(), kind, "thought"));
                        }
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(ContentBlockBuilder::Thought(Thought {
                        text: thought_chunk.text,
                        signature: thought_chunk.signature,
                        provider_type: thought_chunk.provider_type,
                    }));
                }
            }
        }
    }
    Ok(())
}

/// Block ids are strings on the wire but are almost always decimal
/// indices; compare them numerically when possible so `"10"` sorts
/// after `"2"`.
fn compare_block_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
