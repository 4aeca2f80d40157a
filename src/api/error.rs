//! Error type for the notes backend client.
//!
//! [`ApiError`] separates transport failures (worth retrying on the next poll
//! tick) from answers the server gave on purpose (worth surfacing verbatim).

use thiserror::Error;

/// Errors returned by a [`JobApi`](super::JobApi) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server could not be reached, or the connection broke mid-request.
    #[error("network error: {0}")]
    Network(String),

    /// Any non-success HTTP status without a more specific meaning.
    /// `message` is the server's `detail` text, or a fixed fallback.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// Generation was requested before the document reached `ready`.
    #[error("{0}")]
    Precondition(String),

    /// The generated result does not exist (yet).
    #[error("{0}")]
    NotFound(String),

    /// The request could not be built (bad URL, bad header or MIME value).
    /// Nothing was sent.
    #[error("invalid request: {0}")]
    Request(String),

    /// A success response whose body could not be decoded.
    #[error("failed to parse API response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Transport-level failures are transient; everything else is an answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// HTTP status of the failure, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_displays_server_message_verbatim() {
        let err = ApiError::Remote {
            status: 413,
            message: "File too large".into(),
        };
        assert_eq!(err.to_string(), "File too large");
        assert_eq!(err.status(), Some(413));
    }

    #[test]
    fn only_network_errors_are_transient() {
        assert!(ApiError::Network("connection refused".into()).is_transient());
        assert!(!ApiError::NotFound("Notes not found".into()).is_transient());
        assert!(!ApiError::Precondition("Document not ready".into()).is_transient());
        assert!(
            !ApiError::Remote {
                status: 500,
                message: "boom".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn builder_errors_are_not_network_errors() {
        let bad_mime = reqwest::multipart::Part::bytes(Vec::new())
            .mime_str("not a mime type")
            .unwrap_err();
        let err = ApiError::from(bad_mime);
        assert!(matches!(err, ApiError::Request(_)), "{err:?}");
        assert!(!err.is_transient());

        let bad_url = reqwest::Client::new().get("not a url").build().unwrap_err();
        assert!(matches!(ApiError::from(bad_url), ApiError::Request(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
