//! Error types for the fundus screening pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, ScreeningError>;

/// Coarse classification of a failed screening, used by callers to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// The uploaded image or its metadata cannot be encoded.
    InvalidInput,
    /// The inference service rejected the request (4xx).
    Client,
    /// The inference service failed (5xx).
    Server,
    /// No HTTP status was obtained (connect, I/O, timeout).
    Transport,
    /// The inference service answered with a body that breaks the response contract.
    MalformedResponse,
    /// The storage collaborator failed.
    Storage,
    /// Anything else.
    Internal,
}

impl FailureCategory {
    /// HTTP status an outer layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            FailureCategory::InvalidInput | FailureCategory::Client => 400,
            FailureCategory::Server
            | FailureCategory::Transport
            | FailureCategory::MalformedResponse => 502,
            FailureCategory::Storage | FailureCategory::Internal => 500,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::InvalidInput => "invalid-input",
            FailureCategory::Client => "client",
            FailureCategory::Server => "server",
            FailureCategory::Transport => "transport",
            FailureCategory::MalformedResponse => "malformed-response",
            FailureCategory::Storage => "storage",
            FailureCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Main error type for the screening pipeline.
#[derive(Error, Debug)]
pub enum ScreeningError {
    /// Byte depth other than 1, 2 or 4.
    #[error("Unsupported pixel depth: {0} bytes per sample")]
    UnsupportedPixelDepth(u8),

    /// Channel count the wire format cannot express.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannelCount(u8),

    /// Returned bitmap is shorter than width * height * 3.
    #[error("Truncated image buffer: expected at least {expected} bytes, got {actual}")]
    TruncatedImageBuffer {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// The inference service answered with a 4xx status.
    #[error("Inference service rejected the request ({status}): {body}")]
    ClientError {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The inference service answered with a 5xx status.
    #[error("Inference service failed ({status}): {body}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Connection or I/O failure before a status was received, including timeouts.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Response body does not match the expected schema.
    #[error("Malformed server response: {0}")]
    MalformedServerResponse(String),

    /// Unified failure reported by the screening pipeline.
    #[error("Screening failed [{category}]: {source}")]
    ScreeningFailed {
        /// Category of the original failure.
        category: FailureCategory,
        /// The original failure.
        #[source]
        source: Box<ScreeningError>,
    },

    /// Invalid or unsupported inbound image file.
    #[error("Invalid image format: {0}")]
    InvalidFormat(String),

    /// Image dimensions or data mismatch.
    #[error("Image data error: {0}")]
    ImageData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage collaborator error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScreeningError {
    /// Category this error falls into.
    pub fn category(&self) -> FailureCategory {
        match self {
            ScreeningError::UnsupportedPixelDepth(_)
            | ScreeningError::UnsupportedChannelCount(_)
            | ScreeningError::InvalidFormat(_)
            | ScreeningError::ImageData(_) => FailureCategory::InvalidInput,
            ScreeningError::ClientError { .. } => FailureCategory::Client,
            ScreeningError::ServerError { .. } => FailureCategory::Server,
            ScreeningError::TransportError(_) => FailureCategory::Transport,
            ScreeningError::MalformedServerResponse(_)
            | ScreeningError::TruncatedImageBuffer { .. } => FailureCategory::MalformedResponse,
            ScreeningError::Storage(_) | ScreeningError::Io(_) => FailureCategory::Storage,
            ScreeningError::ScreeningFailed { category, .. } => *category,
            ScreeningError::Config(_) | ScreeningError::Internal(_) => FailureCategory::Internal,
        }
    }

    /// Wrap into `ScreeningFailed`, keeping the original category. Already wrapped errors pass through.
    pub fn into_screening_failure(self) -> ScreeningError {
        match self {
            failed @ ScreeningError::ScreeningFailed { .. } => failed,
            other => ScreeningError::ScreeningFailed {
                category: other.category(),
                source: Box::new(other),
            },
        }
    }
}

impl From<image::ImageError> for ScreeningError {
    fn from(err: image::ImageError) -> Self {
        ScreeningError::InvalidFormat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_map_to_status_codes() {
        let client = ScreeningError::ClientError {
            status: 422,
            body: String::new(),
        };
        assert_eq!(client.category(), FailureCategory::Client);
        assert_eq!(client.category().http_status(), 400);

        let server = ScreeningError::ServerError {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(server.category().http_status(), 502);

        let transport = ScreeningError::TransportError("refused".into());
        assert_eq!(transport.category(), FailureCategory::Transport);

        assert_eq!(
            ScreeningError::UnsupportedChannelCount(1).category().http_status(),
            400
        );
    }

    #[test]
    fn test_screening_failure_keeps_cause() {
        let failed = ScreeningError::MalformedServerResponse("missing distances".into())
            .into_screening_failure();

        match &failed {
            ScreeningError::ScreeningFailed { category, source } => {
                assert_eq!(*category, FailureCategory::MalformedResponse);
                assert!(matches!(
                    **source,
                    ScreeningError::MalformedServerResponse(_)
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Wrapping twice does not nest.
        let again = failed.into_screening_failure();
        if let ScreeningError::ScreeningFailed { source, .. } = again {
            assert!(!matches!(*source, ScreeningError::ScreeningFailed { .. }));
        }
    }

    #[test]
    fn test_display_includes_category() {
        let failed = ScreeningError::TransportError("timed out".into()).into_screening_failure();
        let text = failed.to_string();
        assert!(text.contains("transport"));
        assert!(text.contains("timed out"));
    }
}
