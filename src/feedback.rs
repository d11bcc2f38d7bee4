use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The body of a request to the gateway's feedback endpoint. Exactly one
/// of `episode_id` or `inference_id` should be set; the gateway rejects
/// requests that set both or neither.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_id: Option<Uuid>,
    pub metric_name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub tags: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dryrun: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeedbackResponse {
    pub feedback_id: Uuid,
}
