//! Error taxonomy for the verification pipeline.
//!
//! Client errors reject the submission itself (wrong media type, bytes that
//! are not an image). Everything else is a server-side failure. An unknown
//! category is not represented here at all: it is a normal "no match" verdict.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("File must be an image (declared content type: {0})")]
    UnsupportedMediaType(String),

    #[error("Error processing image: {0}")]
    InvalidImage(String),

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Verification failed: {0}")]
    Oracle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VerifyError {
    /// True when the caller sent something unusable, false for failures on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VerifyError::UnsupportedMediaType(_) | VerifyError::InvalidImage(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_client_error() {
            ErrorKind::Client
        } else {
            ErrorKind::Server
        }
    }
}

/// Coarse classification used when reporting failures at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Client,
    Server,
}

pub type VerifyResult<T> = Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_media_type_and_decode_failures() {
        assert!(VerifyError::UnsupportedMediaType("text/plain".into()).is_client_error());
        assert!(VerifyError::InvalidImage("bad header".into()).is_client_error());
    }

    #[test]
    fn oracle_and_internal_failures_are_server_errors() {
        let oracle = VerifyError::Oracle("inference: shape mismatch".into());
        assert_eq!(oracle.kind(), ErrorKind::Server);
        assert_eq!(
            VerifyError::Preprocessing("resize".into()).kind(),
            ErrorKind::Server
        );
        assert_eq!(VerifyError::Config("top_k".into()).kind(), ErrorKind::Server);
    }

    #[test]
    fn oracle_error_message_carries_cause() {
        let err = VerifyError::Oracle("inference: out of memory".into());
        assert_eq!(err.to_string(), "Verification failed: inference: out of memory");
    }

    #[test]
    fn error_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ErrorKind::Client).unwrap(), "client");
        assert_eq!(serde_json::to_value(ErrorKind::Server).unwrap(), "server");
    }
}
