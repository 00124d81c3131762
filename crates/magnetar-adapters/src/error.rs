//! Adapter error details and their mapping onto [`BackendError`].

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use magnetar_torrent_core::BackendError;

#[derive(Debug)]
/// Internal error details used by the HTTP adapters.
pub enum AdapterError {
    /// Building the HTTP client failed.
    ClientBuild {
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The request could not be sent or the response body could not be read.
    Transport {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The server answered with an unexpected HTTP status.
    Status {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Status code returned by the server.
        status: u16,
    },
    /// Transmission kept answering 409 without a usable session id.
    SessionHandshake {
        /// Operation that triggered the failure.
        operation: &'static str,
    },
    /// The RPC envelope reported a failure.
    Rpc {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// `result` string returned by the daemon.
        result: String,
    },
    /// The RPC succeeded but the response lacked a required field.
    MissingField {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Field name that was missing.
        field: &'static str,
    },
}

impl Display for AdapterError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientBuild { .. } => formatter.write_str("failed to build http client"),
            Self::Transport { .. } => formatter.write_str("http request failed"),
            Self::Status { .. } => formatter.write_str("unexpected http status"),
            Self::SessionHandshake { .. } => {
                formatter.write_str("transmission session handshake failed")
            }
            Self::Rpc { .. } => formatter.write_str("transmission rpc reported failure"),
            Self::MissingField { .. } => formatter.write_str("rpc response missing field"),
        }
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ClientBuild { source } | Self::Transport { source, .. } => Some(source),
            Self::Status { .. }
            | Self::SessionHandshake { .. }
            | Self::Rpc { .. }
            | Self::MissingField { .. } => None,
        }
    }
}

impl AdapterError {
    const fn operation(&self) -> &'static str {
        match self {
            Self::ClientBuild { .. } => "http.client",
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::SessionHandshake { operation }
            | Self::Rpc { operation, .. }
            | Self::MissingField { operation, .. } => operation,
        }
    }
}

impl From<AdapterError> for BackendError {
    fn from(err: AdapterError) -> Self {
        let operation = err.operation();
        match err {
            AdapterError::Rpc { result, .. } => Self::Rejected {
                operation,
                message: result,
            },
            AdapterError::Status { status, .. } if (400..500).contains(&status) => {
                Self::Rejected {
                    operation,
                    message: format!("unexpected status code: {status}"),
                }
            }
            other => Self::unavailable(operation, other),
        }
    }
}
