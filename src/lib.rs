//! A typed client for a TensorZero-style inference gateway.
//!
//! Build a [`Client`] with [`ClientBuilder`], then call
//! [`Client::inference`] (streaming or not) and [`Client::feedback`].
//! Streaming responses can be reassembled into the non-streaming shape
//! with [`collect_chunks`].

use std::sync::Arc;

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::de::DeserializeOwned;
use thiserror::Error as ThisError;
use url::Url;

pub mod blocking;
mod client_input;
mod error;
mod feedback;
mod inference;
mod tool;
mod types;

pub use client_input::{ClientInput, ClientInputMessage, ClientInputMessageContent};
pub use error::{Error, ErrorDetails, TensorZeroError, TensorZeroInternalError};
pub use feedback::{FeedbackParams, FeedbackResponse};
pub use inference::{
    ChatCompletionInferenceParams, ChatInferenceResponse, ChatInferenceResponseChunk,
    ClientInferenceParams, InferenceOutput, InferenceParams, InferenceResponse,
    InferenceResponseChunk, InferenceStream, JsonInferenceResponse, JsonInferenceResponseChunk,
    JsonMode,
};
pub use tool::{
    DynamicToolParams, Tool, ToolCall, ToolCallChunk, ToolCallInput, ToolCallOutput, ToolChoice,
    ToolResult,
};
pub use types::{
    collect_chunks, ContentBlockChatOutput, ContentBlockChunk, File, FileKind, FinishReason,
    JsonInferenceOutput, Role, Text, TextChunk, TextKind, Thought, ThoughtChunk, Usage,
};

use crate::error::DisplayOrDebug;

/// How the client talks to the gateway. Today there is a single mode,
/// speaking HTTP to a running gateway.
#[derive(Clone, Debug)]
pub enum ClientBuilderMode {
    HTTPGateway { url: Url },
}

#[derive(Debug, ThisError)]
pub enum ClientBuilderError {
    #[error("Failed to build HTTP client: {message}")]
    HttpClient { message: String },
    #[error("Failed to start async runtime: {message}")]
    Runtime { message: String },
}

pub struct ClientBuilder {
    mode: ClientBuilderMode,
    http_client: Option<reqwest::Client>,
    verbose_errors: bool,
}

impl ClientBuilder {
    pub fn new(mode: ClientBuilderMode) -> Self {
        Self {
            mode,
            http_client: None,
            verbose_errors: false,
        }
    }

    /// Sets the underlying HTTP client used for all gateway requests.
    /// Callers that need custom headers (e.g. auth) attach them here.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// When enabled, error messages include the `Debug` representation of
    /// underlying failures rather than the terser `Display` one.
    pub fn with_verbose_errors(mut self, verbose_errors: bool) -> Self {
        self.verbose_errors = verbose_errors;
        self
    }

    pub async fn build(self) -> Result<Client, ClientBuilderError> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                ClientBuilderError::HttpClient {
                    message: e.to_string(),
                }
            })?,
        };
        let ClientBuilderMode::HTTPGateway { url } = self.mode;
        Ok(Client {
            mode: Arc::new(ClientMode::HTTPGateway(HTTPGateway {
                base_url: url,
                http_client,
            })),
            verbose_errors: self.verbose_errors,
        })
    }
}

pub struct HTTPGateway {
    pub base_url: Url,
    pub http_client: reqwest::Client,
}

pub enum ClientMode {
    HTTPGateway(HTTPGateway),
}

/// An async handle to the gateway. Cheap to clone; holds no per-call
/// state, so a single client can serve any number of concurrent calls.
#[derive(Clone)]
pub struct Client {
    mode: Arc<ClientMode>,
    verbose_errors: bool,
}

impl Client {
    pub fn mode(&self) -> &ClientMode {
        &self.mode
    }

    /// Runs an inference request against the gateway. Returns a complete
    /// response, or a chunk stream when `params.stream` is `Some(true)`.
    pub async fn inference(
        &self,
        params: ClientInferenceParams,
    ) -> Result<InferenceOutput, TensorZeroError> {
        let ClientMode::HTTPGateway(client) = self.mode();
        let url = client.base_url.join("inference").map_err(|e| {
            TensorZeroError::Other {
                source: Error::new(ErrorDetails::InvalidBaseUrl {
                    message: format!("Failed to join base URL with /inference endpoint: {e}"),
                })
                .into(),
            }
        })?;
        let builder = client.http_client.post(url).json(&params);
        if params.stream.unwrap_or(false) {
            let event_source = builder.eventsource().map_err(|e| TensorZeroError::Other {
                source: Error::new(ErrorDetails::JsonRequest {
                    message: format!("Error constructing streaming request: {e}"),
                })
                .into(),
            })?;
            Ok(InferenceOutput::Streaming(inference_stream(
                event_source,
                self.verbose_errors,
            )))
        } else {
            Ok(InferenceOutput::NonStreaming(
                self.parse_http_response(builder.send().await).await?,
            ))
        }
    }

    /// Assigns feedback (a metric value, comment, or demonstration) to an
    /// inference or an episode.
    pub async fn feedback(
        &self,
        params: FeedbackParams,
    ) -> Result<FeedbackResponse, TensorZeroError> {
        let ClientMode::HTTPGateway(client) = self.mode();
        let url = client.base_url.join("feedback").map_err(|e| {
            TensorZeroError::Other {
                source: Error::new(ErrorDetails::InvalidBaseUrl {
                    message: format!("Failed to join base URL with /feedback endpoint: {e}"),
                })
                .into(),
            }
        })?;
        let builder = client.http_client.post(url).json(&params);
        self.parse_http_response(builder.send().await).await
    }

    async fn check_http_response(
        &self,
        resp: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, TensorZeroError> {
        let resp = resp.map_err(|e| TensorZeroError::Other {
            source: Error::new(ErrorDetails::JsonRequest {
                message: format!(
                    "Error sending request to gateway: {}",
                    DisplayOrDebug {
                        val: e,
                        debug: self.verbose_errors,
                    }
                ),
            })
            .into(),
        })?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let text = resp.text().await.ok();
            Err(TensorZeroError::Http {
                status_code: status.as_u16(),
                text,
                source: Error::new(ErrorDetails::JsonRequest {
                    message: format!("Gateway returned status code {status}"),
                })
                .into(),
            })
        }
    }

    async fn parse_http_response<T: DeserializeOwned>(
        &self,
        resp: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, TensorZeroError> {
        let resp = self.check_http_response(resp).await?;
        let bytes = resp.bytes().await.map_err(|e| TensorZeroError::Other {
            source: Error::new(ErrorDetails::JsonRequest {
                message: format!(
                    "Error reading response from gateway: {}",
                    DisplayOrDebug {
                        val: e,
                        debug: self.verbose_errors,
                    }
                ),
            })
            .into(),
        })?;
        let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|e| TensorZeroError::Other {
            source: Error::new(ErrorDetails::Serialization {
                message: format!(
                    "Error deserializing response from gateway: {}",
                    DisplayOrDebug {
                        val: e,
                        debug: self.verbose_errors,
                    }
                ),
            })
            .into(),
        })
    }
}

/// Maps low-level `EventSource` events into our chunk type. The gateway
/// sends a `[DONE]` message after the last chunk.
fn inference_stream(mut event_source: EventSource, verbose_errors: bool) -> InferenceStream {
    Box::pin(async_stream::stream! {
        while let Some(ev) = event_source.next().await {
            match ev {
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, resp)) => {
                    let text = resp.text().await.ok();
                    yield Err(TensorZeroError::Http {
                        status_code: status.as_u16(),
                        text,
                        source: Error::new(ErrorDetails::StreamError {
                            message: format!("Gateway returned status code {status}"),
                        })
                        .into(),
                    });
                    break;
                }
                Err(e) => {
                    yield Err(TensorZeroError::Other {
                        source: Error::new(ErrorDetails::StreamError {
                            message: format!(
                                "Error in streaming response: {}",
                                DisplayOrDebug {
                                    val: e,
                                    debug: verbose_errors,
                                }
                            ),
                        })
                        .into(),
                    });
                    break;
                }
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    if message.data == "[DONE]" {
                        break;
                    }
                    match serde_json::from_str::<InferenceResponseChunk>(&message.data) {
                        Ok(chunk) => yield Ok(chunk),
                        Err(e) => {
                            yield Err(TensorZeroError::Other {
                                source: Error::new(ErrorDetails::Serialization {
                                    message: format!(
                                        "Error deserializing stream chunk: {e}, Data: {}",
                                        message.data
                                    ),
                                })
                                .into(),
                            });
                        }
                    }
                }
            }
        }
        event_source.close();
    })
}
