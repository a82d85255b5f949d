//! Error type shared by every client operation.
//!
//! # Design
//! Callers handle exactly one error type. Validation failures are raised
//! before any network I/O, `Http` covers a response that arrived with a
//! status other than 200, and `Transport` covers everything that prevented a
//! usable response from arriving at all (after the dispatcher's retries).

use thiserror::Error;

/// Status page callers are pointed at when the platform looks unreachable.
pub const STATUS_PAGE: &str = "http://status.customer.io";

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by `TrackClient` and `ApiClient`.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was blank or malformed. No request was sent.
    #[error("{0}")]
    Validation(String),

    /// The server answered with a status other than 200.
    #[error("{status}: {url} {body} {response}")]
    Http {
        status: u16,
        url: String,
        /// JSON text that was submitted, empty when the request had no body.
        body: String,
        response: String,
    },

    /// No usable response after all retries.
    #[error(
        "Failed to receive valid response after {retries} retries.\n\
         Check system status at {page}.\n\
         Last caught exception -- {message}",
        page = STATUS_PAGE
    )]
    Transport { retries: u32, message: String },

    /// The region code is not in the region table.
    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("{value} is not a valid timestamp ({reason})")]
    InvalidTimestamp { value: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    /// Blank-argument error in the `"<param> cannot be blank in <operation>"` form.
    pub(crate) fn blank(param: &str, operation: &str) -> Self {
        Error::Validation(format!("{param} cannot be blank in {operation}"))
    }

    /// HTTP status of a rejected request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
