use std::path::PathBuf;
use thiserror::Error;

use crate::resp::api::GatewayError;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid gateway host pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failures of the document store seam.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSer(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} doesn't exist")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Role gate failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("not signed in")]
    SignedOut,
    #[error("account is waiting for approval")]
    PendingApproval,
    #[error("permission level too low: {0}")]
    Forbidden(&'static str),
}

/// Identity provider failures surfaced by `login`/`logout`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("sign-in was cancelled")]
    Cancelled,
    #[error("sign-in was denied: {0}")]
    Denied(String),
    #[error("identity provider failure: {0}")]
    Provider(String),
    #[error("unable to resolve profile: {0}")]
    Profile(String),
}

/// Client-side validation failures, raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("a submission needs at least one image or a text answer")]
    EmptySubmission,
    #[error("at most {max} images can be attached")]
    TooManyImages { max: usize },
    #[error("'{name}' is {size} bytes, the limit is {limit} bytes")]
    FileTooLarge { name: String, size: usize, limit: usize },
    #[error("{0} can't be empty")]
    Blank(&'static str),
    #[error("assignment was already submitted")]
    AlreadySubmitted,
    #[error("submission was already graded")]
    AlreadyGraded,
    #[error("there are no ungraded submissions")]
    NothingToGrade,
    #[error("'{0}' isn't a gateway URL")]
    MalformedGatewayUrl(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("no class with code '{0}'")]
    UnknownCode(String),
    #[error("class '{0}' doesn't exist")]
    ClassNotFound(String),
    #[error("unable to generate a unique class code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

/// Errors of the teacher and student desks.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("submission '{0}' doesn't exist")]
    SubmissionNotFound(String),
}
