//! A thread-blocking interface to the gateway, for callers that are not
//! already running inside an async runtime.
//!
//! Each [`Client`] owns a multi-thread tokio runtime and delegates every
//! call to the async client, so the observable behavior (wire format,
//! chunk sequencing, error taxonomy) is identical to the async facade.

use std::sync::Arc;

use futures::StreamExt;
use tokio::runtime::Runtime;

use crate::{
    ClientBuilderError, ClientBuilderMode, FeedbackParams, FeedbackResponse,
    InferenceResponse, InferenceResponseChunk, TensorZeroError,
};

pub struct ClientBuilder {
    inner: crate::ClientBuilder,
}

impl ClientBuilder {
    pub fn new(mode: ClientBuilderMode) -> Self {
        Self {
            inner: crate::ClientBuilder::new(mode),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.inner = self.inner.with_http_client(client);
        self
    }

    pub fn with_verbose_errors(mut self, verbose_errors: bool) -> Self {
        self.inner = self.inner.with_verbose_errors(verbose_errors);
        self
    }

    pub fn build(self) -> Result<Client, ClientBuilderError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ClientBuilderError::Runtime {
                message: e.to_string(),
            })?;
        let inner = runtime.block_on(self.inner.build())?;
        Ok(Client {
            inner,
            runtime: Arc::new(runtime),
        })
    }
}

/// A blocking handle to the gateway.
///
/// Must not be constructed or used from within an async runtime; use the
/// async [`crate::Client`] there instead.
#[derive(Clone)]
pub struct Client {
    inner: crate::Client,
    runtime: Arc<Runtime>,
}

impl Client {
    pub fn inference(
        &self,
        params: crate::ClientInferenceParams,
    ) -> Result<InferenceOutput, TensorZeroError> {
        match self.runtime.block_on(self.inner.inference(params))? {
            crate::InferenceOutput::NonStreaming(response) => {
                Ok(InferenceOutput::NonStreaming(response))
            }
            crate::InferenceOutput::Streaming(stream) => {
                Ok(InferenceOutput::Streaming(InferenceStream {
                    runtime: self.runtime.clone(),
                    stream,
                }))
            }
        }
    }

    pub fn feedback(&self, params: FeedbackParams) -> Result<FeedbackResponse, TensorZeroError> {
        self.runtime.block_on(self.inner.feedback(params))
    }
}

pub enum InferenceOutput {
    NonStreaming(InferenceResponse),
    Streaming(InferenceStream),
}

/// Blocks on each chunk of a streaming inference response.
pub struct InferenceStream {
    runtime: Arc<Runtime>,
    stream: crate::InferenceStream,
}

impl Iterator for InferenceStream {
    type Item = Result<InferenceResponseChunk, TensorZeroError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
