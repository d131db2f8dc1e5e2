//! Unified error type for livemux.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the HTTP layer to derive a status code via [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in livemux.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found (e.g. an unpublished stream).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "stream").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A track was announced with fewer parameter sets than its codec needs.
    #[error("Invalid parameters for {codec}: need {need} parameter sets, have {have}")]
    InvalidParameters {
        /// Codec name.
        codec: String,
        /// Number of parameter sets required.
        need: usize,
        /// Number of parameter sets supplied.
        have: usize,
    },

    /// A fragment could not be serialized.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The output sink is gone (the viewer disconnected).
    #[error("Output sink closed")]
    SinkClosed,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 400,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::InvalidParameters { .. } => 500,
            Error::Encode(_) => 500,
            Error::SinkClosed => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidParameters`].
    pub fn invalid_parameters(codec: impl fmt::Display, need: usize, have: usize) -> Self {
        Error::InvalidParameters {
            codec: codec.to_string(),
            need,
            have,
        }
    }

    /// Convenience constructor for [`Error::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Error::Encode(msg.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("stream", "live/cam1");
        assert_eq!(err.to_string(), "stream not found: live/cam1");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("empty stream path".into());
        assert_eq!(err.to_string(), "Validation error: empty stream path");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn conflict_display() {
        let err = Error::Conflict("stream already published".into());
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn invalid_parameters_display() {
        let err = Error::invalid_parameters("h265", 3, 1);
        assert_eq!(
            err.to_string(),
            "Invalid parameters for h265: need 3 parameter sets, have 1"
        );
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn encode_display() {
        let err = Error::encode("mdat too large");
        assert_eq!(err.to_string(), "Encode error: mdat too large");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }
}
