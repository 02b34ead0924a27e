//! Error types for the MathJax loader

use std::fmt;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, Error>;

/// The public entry point that raised an error.
///
/// Carried as structured metadata on [`Error`]; it is not part of the
/// rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Attaching the MathJax script to the document
    LoadMathJax,
    /// Enqueueing a typeset job on the MathJax hub
    TypesetMath,
}

impl Operation {
    /// Stable string tag for the operation
    pub fn tag(self) -> &'static str {
        match self {
            Operation::LoadMathJax => "loadMathJax",
            Operation::TypesetMath => "typesetMath",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Errors that can occur while loading MathJax or typesetting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The script element could not be attached to the document head
    #[error("{message}")]
    InsertionFailed { message: String, operation: Operation },

    /// The typeset job could not be enqueued on the hub
    #[error("{message}")]
    EnqueueFailed { message: String, operation: Operation },

    /// A pending load or typeset was abandoned before it completed
    #[error("Operation canceled: {0}")]
    Canceled(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to execute JavaScript through a script bridge
    #[error("Script execution failed: {0}")]
    ScriptError(String),
}

impl Error {
    pub(crate) fn insertion(message: impl Into<String>) -> Self {
        Error::InsertionFailed {
            message: message.into(),
            operation: Operation::LoadMathJax,
        }
    }

    pub(crate) fn enqueue(message: impl Into<String>) -> Self {
        Error::EnqueueFailed {
            message: message.into(),
            operation: Operation::TypesetMath,
        }
    }

    /// The entry point that raised this error, if it came from one
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::InsertionFailed { operation, .. } | Error::EnqueueFailed { operation, .. } => {
                Some(*operation)
            }
            _ => None,
        }
    }

    /// The underlying failure message without any prefix
    pub fn message(&self) -> &str {
        match self {
            Error::InsertionFailed { message, .. } | Error::EnqueueFailed { message, .. } => message,
            Error::Canceled(m) | Error::ConfigError(m) | Error::ScriptError(m) => m,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_errors_render_only_the_message() {
        let err = Error::insertion("head is missing");
        assert_eq!(err.to_string(), "head is missing");
        assert_eq!(err.operation(), Some(Operation::LoadMathJax));
        assert_eq!(err.operation().map(Operation::tag), Some("loadMathJax"));

        let err = Error::enqueue("Hub.Queue is not a function");
        assert_eq!(err.message(), "Hub.Queue is not a function");
        assert_eq!(err.operation().map(Operation::tag), Some("typesetMath"));
    }

    #[test]
    fn untagged_errors_have_no_operation() {
        let err = Error::ConfigError("bad".into());
        assert_eq!(err.operation(), None);
        assert_eq!(err.to_string(), "Invalid configuration: bad");
        assert_eq!(err.message(), "bad");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
