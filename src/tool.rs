use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, ErrorDetails};

/// A Tool object describes how a tool can be dynamically configured by the user.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Tool {
    pub description: String,
    pub parameters: Value,
    pub name: String,
    #[serde(default)]
    pub strict: bool,
}

/// Inference-time overrides for the function-level tool configuration.
/// `allowed_tools` should be a subset of the tools configured for the
/// function; if not provided, all tools are allowed. `additional_tools`
/// are defined at runtime and compiled by the gateway on the fly.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicToolParams {
    pub allowed_tools: Option<Vec<String>>,
    pub additional_tools: Option<Vec<Tool>>,
    pub tool_choice: Option<ToolChoice>,
    pub parallel_tool_calls: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[serde(deny_unknown_fields)]
pub enum ToolChoice {
    None,
    #[default]
    Auto,
    Required,
    // Forces the model to call a specific tool. The String is the name of the tool.
    Specific(String),
}

/// A ToolCall is a request by a model to call a Tool
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
    pub id: String,
}

/// The input format that we accept from callers.
/// This is like `ToolCallOutput`, but more relaxed (`raw_arguments` and
/// `raw_name` are optional). This allows round-tripping a `ToolCallOutput`
/// without modifying the json object, but also allows manually-constructed
/// inputs where callers don't care about the name/raw_name distinction.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCallInput {
    pub name: Option<String>,
    pub arguments: Option<Value>,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_name: Option<String>,
}

impl TryFrom<ToolCallInput> for ToolCall {
    type Error = Error;
    fn try_from(value: ToolCallInput) -> Result<Self, Self::Error> {
        let name = value.name.or(value.raw_name).ok_or_else(|| {
            Error::new(ErrorDetails::InvalidRequest {
                message: "ToolCall must have `name` or `raw_name` set".to_string(),
            })
        })?;

        let arguments = if let Some(arguments) = value.arguments {
            match arguments {
                Value::String(s) => {
                    tracing::warn!("Deprecation Warning: Treating string 'ToolCall.arguments' as a serialized JSON object. Please pass in a JSON object instead. Support for strings will be removed in a future release.");
                    s
                }
                Value::Object(obj) => Value::Object(obj).to_string(),
                _ => {
                    return Err(Error::new(ErrorDetails::InvalidRequest {
                        message: "ToolCall arguments must be a string or an object".to_string(),
                    }));
                }
            }
        } else if let Some(raw_arguments) = value.raw_arguments {
            raw_arguments
        } else {
            return Err(Error::new(ErrorDetails::InvalidRequest {
                message: "ToolCall must have `arguments` or `raw_arguments` set".to_string(),
            }));
        };

        Ok(ToolCall {
            name,
            arguments,
            id: value.id,
        })
    }
}

/// A tool call as it appears in an assembled response. `raw_name` and
/// `raw_arguments` are exactly what the model produced; `name` and
/// `arguments` are only populated when the raw values were usable
/// (non-empty name, arguments that parsed as JSON).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ToolCallOutput {
    pub arguments: Option<Value>,
    pub id: String,
    pub name: Option<String>,
    pub raw_arguments: String,
    pub raw_name: String,
}

/// A ToolResult is the outcome of a ToolCall, which we may want to present back to the model
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolResult {
    pub name: String,
    pub result: String,
    pub id: String,
}

/// An incremental fragment of a tool call in a streaming response. All
/// fragments of one call share an `id`; `raw_name` and `raw_arguments`
/// accumulate by concatenation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ToolCallChunk {
    pub id: String,
    #[serde(serialize_with = "serialize_option_string_as_empty")]
    pub raw_name: Option<String>,
    pub raw_arguments: String,
}

fn serialize_option_string_as_empty<S>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}
