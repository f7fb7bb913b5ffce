//! Error types for the document backend.
//!
//! [`BackendError`] is derived with [`thiserror`] and folds into
//! [`ExamError`] at the crate boundary so callers deal with one error type.

use examcard_core::ExamError;
use thiserror::Error;

/// Error type for document loading and page interpretation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Structural problem in the document (xref, objects, page tree).
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Error reading the document from disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error resolving font or encoding information.
    #[error("font error: {0}")]
    Font(String),

    /// Error while walking a content stream.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// The document is encrypted and cannot be opened without a password.
    #[error("document is encrypted and requires a password")]
    Encrypted,

    /// A core library error.
    #[error(transparent)]
    Core(#[from] ExamError),
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

impl From<BackendError> for ExamError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Parse(msg) => ExamError::ParseError(msg),
            BackendError::Io(e) => ExamError::IoError(e.to_string()),
            BackendError::Font(msg) => ExamError::ParseError(format!("font: {msg}")),
            BackendError::Interpreter(msg) => ExamError::ParseError(format!("content: {msg}")),
            BackendError::Encrypted => {
                ExamError::ParseError("document is encrypted and requires a password".to_string())
            }
            BackendError::Core(e) => e,
        }
    }
}
