use std::fmt::{Debug, Display};
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Internal error type shared by every fallible path in the crate.
///
/// As long as the struct member is private, we force people to use the `new`
/// method and log the error. We arc `ErrorDetails` to make it cheap to clone.
#[derive(Clone, Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
#[error(transparent)]
pub struct Error(Arc<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Arc::new(details))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ErrorDetails {
    InvalidBaseUrl {
        message: String,
    },
    InvalidMessage {
        message: String,
    },
    InvalidRequest {
        message: String,
    },
    JsonRequest {
        message: String,
    },
    Serialization {
        message: String,
    },
    StreamError {
        message: String,
    },
    /// A streaming chunk violated the chunk protocol (e.g. a content block
    /// changed variant mid-stream at a fixed block id).
    InvalidStreamChunk {
        message: String,
    },
    InternalError {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the level at which to log the error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::InvalidMessage { .. } | ErrorDetails::InvalidRequest { .. } => {
                tracing::Level::WARN
            }
            ErrorDetails::InvalidBaseUrl { .. }
            | ErrorDetails::JsonRequest { .. }
            | ErrorDetails::Serialization { .. }
            | ErrorDetails::StreamError { .. }
            | ErrorDetails::InvalidStreamChunk { .. }
            | ErrorDetails::InternalError { .. } => tracing::Level::ERROR,
        }
    }

    /// Defines the HTTP status code that corresponds to the error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::InvalidBaseUrl { .. }
            | ErrorDetails::InvalidMessage { .. }
            | ErrorDetails::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::JsonRequest { .. }
            | ErrorDetails::Serialization { .. }
            | ErrorDetails::StreamError { .. }
            | ErrorDetails::InvalidStreamChunk { .. }
            | ErrorDetails::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::InvalidBaseUrl { message }
            | ErrorDetails::InvalidMessage { message }
            | ErrorDetails::InvalidRequest { message }
            | ErrorDetails::JsonRequest { message }
            | ErrorDetails::Serialization { message }
            | ErrorDetails::StreamError { message }
            | ErrorDetails::InvalidStreamChunk { message }
            | ErrorDetails::InternalError { message } => write!(f, "{message}"),
        }
    }
}

/// A client-side or infrastructure failure (decode error, transport failure,
/// chunk-protocol violation). Never constructed from a structured gateway
/// rejection - those become [`TensorZeroError::Http`].
#[derive(Debug, Error)]
#[error(transparent)]
pub struct TensorZeroInternalError(#[from] pub Error);

/// The error type returned by every facade operation.
///
/// `Http` wraps a structured failure reported by the gateway itself
/// (status code plus the raw response body), so callers can branch on
/// gateway-defined semantics. `Other` wraps a failure that originated in
/// the client. Exactly one of the two is produced per failing operation.
#[derive(Debug, Error)]
pub enum TensorZeroError {
    #[error("HTTP Error (status code {status_code}): {text:?}")]
    Http {
        status_code: u16,
        text: Option<String>,
        #[source]
        source: TensorZeroInternalError,
    },
    #[error(transparent)]
    Other {
        #[from]
        source: TensorZeroInternalError,
    },
}

impl TensorZeroError {
    /// The status code reported by the gateway, if the gateway produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TensorZeroError::Http { status_code, .. } => Some(*status_code),
            TensorZeroError::Other { .. } => None,
        }
    }

    /// Whether the failure originated in the client (as opposed to being a
    /// structured rejection reported by the gateway).
    pub fn is_client_error(&self) -> bool {
        match self {
            TensorZeroError::Http { .. } => false,
            TensorZeroError::Other { .. } => true,
        }
    }
}

impl From<Error> for TensorZeroError {
    fn from(e: Error) -> Self {
        TensorZeroError::Other {
            source: TensorZeroInternalError(e),
        }
    }
}

/// Chooses between a `Debug` or `Display` representation based on the
/// client's `verbose_errors` setting.
pub(crate) struct DisplayOrDebug<T: Debug + Display> {
    pub val: T,
    pub debug: bool,
}

impl<T: Debug + Display> Display for DisplayOrDebug<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.debug {
            write!(f, "{:?}", self.val)
        } else {
            write!(f, "{}", self.val)
        }
    }
}
