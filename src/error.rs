//! Error types for snapshot acquisition and the application shell.
//!
//! These errors are serializable so the presentation layer can surface the
//! most recent failure (e.g. in a diagnostics view) without string parsing.

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Failure to acquire a snapshot of pending review requests.
///
/// The tracker treats every variant as "acquisition failed", but the kind is
/// kept so the user can see why the last poll did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AcquisitionError {
    /// Token missing, expired, revoked or lacking permissions.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Endpoint or resource does not exist.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// API rate limit exhausted.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reset_at: Option<i64>,
    },

    /// Response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Transport failure, including timeouts.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Anything else.
    #[error("Error: {message}")]
    Unknown {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

/// Fieldless discriminant of [`AcquisitionError`], for display and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionErrorKind {
    Unauthorized,
    NotFound,
    RateLimited,
    Decode,
    Network,
    Unknown,
}

impl std::fmt::Display for AcquisitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not_found"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Decode => write!(f, "decode"),
            Self::Network => write!(f, "network"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl AcquisitionError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            status_code: None,
        }
    }

    /// No token could be resolved from the environment or the keychain.
    pub fn missing_token() -> Self {
        Self::unauthorized("No GitHub token found. Set GITHUB_TOKEN or run `token set`.")
    }

    pub fn not_found(message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            endpoint: Some(endpoint.into()),
        }
    }

    pub fn rate_limited(message: impl Into<String>, reset_at: Option<i64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            reset_at,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            status_code: None,
        }
    }

    /// Map a non-success HTTP status to an acquisition error.
    ///
    /// `rate_limit_exhausted` is true when the response said no requests
    /// remain in the current window; GitHub reports that as a 403.
    pub fn from_status(
        status: StatusCode,
        endpoint: &str,
        rate_limit_exhausted: bool,
        reset_at: Option<i64>,
    ) -> Self {
        let status_code = Some(status.as_u16());
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized {
                message: "Unauthorized - check your GitHub token".to_string(),
                status_code,
            },
            StatusCode::TOO_MANY_REQUESTS => {
                Self::rate_limited("Rate limit exceeded", reset_at)
            }
            StatusCode::FORBIDDEN if rate_limit_exhausted => {
                Self::rate_limited("Rate limit exceeded", reset_at)
            }
            StatusCode::FORBIDDEN => Self::Unauthorized {
                message: "Forbidden - token may lack required permissions".to_string(),
                status_code,
            },
            StatusCode::NOT_FOUND => {
                Self::not_found("Not found - check API endpoint", endpoint)
            }
            StatusCode::UNPROCESSABLE_ENTITY => Self::Unknown {
                message: "Unprocessable entity - check search query".to_string(),
                status_code,
            },
            _ => Self::Unknown {
                message: format!("HTTP error {}", status.as_u16()),
                status_code,
            },
        }
    }

    /// The error's kind, without its details.
    pub fn kind(&self) -> AcquisitionErrorKind {
        match self {
            Self::Unauthorized { .. } => AcquisitionErrorKind::Unauthorized,
            Self::NotFound { .. } => AcquisitionErrorKind::NotFound,
            Self::RateLimited { .. } => AcquisitionErrorKind::RateLimited,
            Self::Decode { .. } => AcquisitionErrorKind::Decode,
            Self::Network { .. } => AcquisitionErrorKind::Network,
            Self::Unknown { .. } => AcquisitionErrorKind::Unknown,
        }
    }
}

impl From<reqwest::Error> for AcquisitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network("Failed to connect to server")
        } else if err.is_decode() {
            Self::decode(format!("Failed to decode GitHub API response: {}", err))
        } else if let Some(status) = err.status() {
            Self::from_status(status, err.url().map(|u| u.path()).unwrap_or(""), false, None)
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AcquisitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(format!("Failed to decode GitHub API response: {}", err))
    }
}

/// Application-level errors outside of snapshot acquisition.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Settings file could not be read, parsed or written.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Credential storage operation failed.
    #[error("Credential storage error: {message}")]
    CredentialStorage { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The tracker task is no longer running.
    #[error("Review tracker is not running")]
    EngineStopped,

    /// Talking to GitHub failed outside of the poll loop.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn credential_storage(message: impl Into<String>) -> Self {
        Self::CredentialStorage {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(format!("Invalid settings JSON: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::config(format!("Settings file I/O failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = AcquisitionError::from_status(StatusCode::UNAUTHORIZED, "/search/issues", false, None);
        assert_eq!(err.kind(), AcquisitionErrorKind::Unauthorized);

        let err = AcquisitionError::from_status(StatusCode::FORBIDDEN, "/search/issues", false, None);
        assert_eq!(err.kind(), AcquisitionErrorKind::Unauthorized);

        let err = AcquisitionError::from_status(
            StatusCode::FORBIDDEN,
            "/search/issues",
            true,
            Some(1_700_000_000),
        );
        assert_eq!(err.kind(), AcquisitionErrorKind::RateLimited);

        let err =
            AcquisitionError::from_status(StatusCode::TOO_MANY_REQUESTS, "/search/issues", false, None);
        assert_eq!(err.kind(), AcquisitionErrorKind::RateLimited);

        let err = AcquisitionError::from_status(StatusCode::NOT_FOUND, "/search/issues", false, None);
        assert_eq!(err.kind(), AcquisitionErrorKind::NotFound);

        let err = AcquisitionError::from_status(StatusCode::BAD_GATEWAY, "/search/issues", false, None);
        assert_eq!(err.kind(), AcquisitionErrorKind::Unknown);
    }

    #[test]
    fn test_acquisition_error_serialization() {
        let err = AcquisitionError::not_found("Not found - check API endpoint", "/search/issues");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"NotFound\""));
        assert!(json.contains("/search/issues"));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AcquisitionError::unauthorized("bad token");
        let json = serde_json::to_string(&err).unwrap();
        // status_code is None, so should not appear
        assert!(!json.contains("status_code"));
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        assert_eq!(
            AcquisitionError::missing_token().kind(),
            AcquisitionErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AcquisitionErrorKind::RateLimited.to_string(), "rate_limited");
        assert_eq!(AcquisitionErrorKind::Network.to_string(), "network");
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::config_field("must be at least 1 second", "poll_interval_secs");
        assert_eq!(
            format!("{}", err),
            "Configuration error: must be at least 1 second"
        );

        let err: AppError = AcquisitionError::network("Request timed out").into();
        assert_eq!(format!("{}", err), "Network error: Request timed out");
    }
}
