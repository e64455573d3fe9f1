use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors thay may occur in this library.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// Listing the serial endpoints of the host failed.
    /// The catalog recovers from this by listing mock devices instead.
    #[error("Could not enumerate serial endpoints: {0}")]
    Enumeration(String),

    /// Connecting to an endpoint failed, or the endpoint is not known.
    #[error("Could not connect to `{path}`. Problem: {problem}")]
    Connection {
        /// The path we tried to connect to.
        path: String,

        /// What went wrong.
        problem: String,
    },

    /// Reading (or similar) requires a connected device, but there is none.
    #[error("No device connected. Use /auto-detect or /connect first")]
    NotConnected,

    /// There was nothing to connect to.
    #[error("No devices found")]
    NoDevices,

    /// The user did something which is not valid.
    /// For example, asking for a manual connection without a path.
    #[error("The request did not conform to valid usage. Problem: `{0}`")]
    BadUsage(String),

    /// The configuration file is not valid.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// Something unexpected happened inside the server.
    #[error("Internal issue: {0}")]
    InternalIssue(String),
}

impl Error {
    /// Create a connection error for the given path.
    pub fn connection<P: AsRef<str>, S: ToString>(path: P, problem: S) -> Self {
        Self::Connection {
            path: path.as_ref().into(),
            problem: problem.to_string(),
        }
    }

    /// Get the inner problem if this is a [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }

    /// Get the attempted path and the problem if this is a [`Error::Connection`].
    pub fn try_into_connection(self) -> Result<(String, String), Self> {
        if let Self::Connection { path, problem } = self {
            Ok((path, problem))
        } else {
            Err(self)
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotConnected | Error::BadUsage(_) | Error::Connection { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::NoDevices => StatusCode::NOT_FOUND,
            Error::Enumeration(_) | Error::BadConfig(_) | Error::InternalIssue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// The body sent to HTTP clients when a request fails.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable description.
    pub detail: String,

    /// The structured error.
    pub error: Error,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            detail: self.to_string(),
            error: self,
        };

        (status, Json(body)).into_response()
    }
}
