//! Error types for the Bilibili metadata API.

use dilidili_core::MetadataError;
use thiserror::Error;

/// Errors that can occur while talking to the metadata API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the response body not read.
    #[error("Network error: {reason}")]
    NetworkError {
        /// The reason for the network error
        reason: String,
    },

    /// Server answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Response body was not the expected JSON.
    #[error("Parse error: {reason}")]
    ParseError {
        /// The reason for the parse error
        reason: String,
    },

    /// API envelope carried a non-zero code.
    #[error("API returned code {code}: {message}")]
    Rejected {
        /// API status code
        code: i64,
        /// API message, possibly empty
        message: String,
    },

    /// A field the provider relies on was absent.
    #[error("Missing data: {what}")]
    MissingData {
        /// Description of the absent field
        what: String,
    },

    /// Configured base URL cannot be used.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected base URL
        url: String,
        /// The reason it was rejected
        reason: String,
    },

    /// HTTP client could not be constructed.
    #[error("Client setup failed: {reason}")]
    ClientSetup {
        /// The reason for the setup failure
        reason: String,
    },
}

impl ApiError {
    /// Converts into the collaborator error reported to the pipeline.
    pub fn into_metadata_error(self, identifier: &str) -> MetadataError {
        let identifier = identifier.to_string();
        match self {
            ApiError::Rejected { code, message } => MetadataError::Rejected {
                identifier,
                code,
                message,
            },
            ApiError::ParseError { reason } => MetadataError::Malformed { identifier, reason },
            ApiError::MissingData { what } => MetadataError::Malformed {
                identifier,
                reason: format!("missing {what}"),
            },
            other => MetadataError::LookupFailed {
                identifier,
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_error_mapping() {
        let rejected = ApiError::Rejected {
            code: -404,
            message: "啥都木有".to_string(),
        }
        .into_metadata_error("BV1x");
        assert!(matches!(
            rejected,
            MetadataError::Rejected { code: -404, ref identifier, .. } if identifier == "BV1x"
        ));

        let missing = ApiError::MissingData {
            what: "data.dash".to_string(),
        }
        .into_metadata_error("BV1x");
        assert!(matches!(missing, MetadataError::Malformed { .. }));

        let network = ApiError::HttpStatus {
            status: 502,
            url: "http://api/x".to_string(),
        }
        .into_metadata_error("BV1x");
        match network {
            MetadataError::LookupFailed { reason, .. } => assert!(reason.contains("502")),
            other => panic!("expected LookupFailed, got {other:?}"),
        }
    }
}
