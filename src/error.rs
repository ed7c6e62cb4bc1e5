use std::path::PathBuf;

use thiserror::Error;

use crate::proto::{Status, StatusCode};

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("gRPC status error: {0}")]
    Status(tonic::Status),

    #[error("service unavailable: {0}")]
    Unavailable(tonic::Status),

    #[error("request throttled ({code:?}): {description}")]
    Throttled { code: StatusCode, description: String },

    #[error("RPC method `{0}` does not exist on the V2 service")]
    MethodNotFound(String),

    /// A call answered with a non-success platform status. The status is kept
    /// as received, including codes this SDK has no name for.
    #[error("API call failed with status {}: {}", .status.code, .status.description)]
    Api { status: Status },

    #[error("listing `{method}` failed with status {}: {}", .status.code, .status.description)]
    ListingFailed { method: String, status: Status },

    #[error("max retry attempts reached ({attempts})")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SdkError>,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// Whether the retrying stub may try the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SdkError::Unavailable(_) | SdkError::Throttled { .. })
    }

    /// Raw platform status code carried by the error, if any.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            SdkError::Throttled { code, .. } => Some(*code as i32),
            SdkError::Api { status } | SdkError::ListingFailed { status, .. } => Some(status.code),
            SdkError::RetriesExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// [`status_code`](Self::status_code) as a named [`StatusCode`]. `None`
    /// for codes missing from the enumeration.
    pub fn known_status_code(&self) -> Option<StatusCode> {
        self.status_code()
            .and_then(|code| StatusCode::try_from(code).ok())
    }
}

impl From<tonic::Status> for SdkError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Unavailable => SdkError::Unavailable(status),
            _ => SdkError::Status(status),
        }
    }
}

/// Failures detected while resolving credentials, identity or endpoints.
/// These are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("user_id is required (set CLARIFAI_USER_ID)")]
    MissingUserId,

    #[error("app_id is required (set CLARIFAI_APP_ID)")]
    MissingAppId,

    #[error("a personal access token or a session token is required (set CLARIFAI_PAT or CLARIFAI_SESSION_TOKEN)")]
    MissingCredential,

    #[error("only one of a personal access token or a session token may be set")]
    ConflictingCredentials,

    #[error("root certificates path {0} does not exist")]
    RootCertificatesNotFound(PathBuf),

    #[error("invalid resource type `{given}`, expected one of: {valid}")]
    InvalidResourceType { given: String, valid: String },

    #[error("a scheme is required for `{0}`: prefix it with http:// or https://")]
    SchemeRequired(String),

    #[error("the scheme for host `{0}` has not been resolved")]
    SchemeUnresolved(String),

    #[error("`{0}` must not be empty")]
    EmptySecret(&'static str),

    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),

    #[error("credential cannot be sent as gRPC metadata")]
    InvalidMetadata,
}

pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(SdkError::from(tonic::Status::unavailable("down")).is_retryable());
        assert!(SdkError::Throttled {
            code: StatusCode::ConnThrottled,
            description: "slow down".into(),
        }
        .is_retryable());

        assert!(!SdkError::from(tonic::Status::permission_denied("no")).is_retryable());
        assert!(!SdkError::MethodNotFound("Nope".into()).is_retryable());
        assert!(!SdkError::Config(ConfigError::MissingUserId).is_retryable());
    }

    #[test]
    fn exhausted_retries_expose_last_status() {
        let err = SdkError::RetriesExhausted {
            attempts: 3,
            source: Box::new(SdkError::Throttled {
                code: StatusCode::ConnExceedHourlyLimit,
                description: "hourly limit".into(),
            }),
        };
        assert_eq!(err.status_code(), Some(StatusCode::ConnExceedHourlyLimit as i32));
        assert_eq!(err.known_status_code(), Some(StatusCode::ConnExceedHourlyLimit));
        assert_eq!(err.to_string(), "max retry attempts reached (3)");
    }

    #[test]
    fn unnamed_status_code_is_kept_verbatim() {
        let err = SdkError::Api {
            status: Status {
                code: 21200,
                description: "Model does not exist".into(),
                ..Default::default()
            },
        };
        assert_eq!(err.status_code(), Some(21200));
        assert_eq!(err.known_status_code(), None);
        assert_eq!(
            err.to_string(),
            "API call failed with status 21200: Model does not exist"
        );
    }
}
