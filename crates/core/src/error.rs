//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

/// The named error kinds a Shelf or Gallery command can fail with.
///
/// These are distinct from [`DomainError`]: `DomainError` is the generic
/// shape infrastructure code reasons about, `CmsError` is the closed set of
/// outcomes the content model actually produces. Aggregates return
/// `CmsError` from `handle`; infrastructure converts it to `DomainError`
/// only at the boundary where a generic view is needed (logging, a future
/// transport adapter).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CmsError {
    /// An operation was attempted on an aggregate that has not been created yet.
    #[error("aggregate has not been created")]
    NotCreated,

    /// `Create` was called on an aggregate that already exists.
    #[error("aggregate already created")]
    AlreadyCreated,

    /// A name field was empty where a non-empty name is required.
    #[error("name must not be empty")]
    EmptyName,

    /// The requested document, image, or stack does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique name collided with one already registered for this scope.
    #[error("duplicate unique name: {0}")]
    DuplicateUniqueName(String),

    /// An operation was blocked by a domain guard (e.g. removing a unique document).
    #[error("guarded: {0}")]
    Guarded(String),

    /// A stack's invariants were violated (e.g. no original image).
    #[error("stack corrupted: {0}")]
    StackCorrupted(String),

    /// A streamed upload could not be completed.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A required dependency (object store, pipeline) was not configured.
    #[error("unconfigured: {0}")]
    Unconfigured(String),

    /// A referenced file is missing from the object store.
    #[error("file not found: {0}")]
    FileNotFound(String),
}

/// Maps each [`CmsError`] onto the HTTP status code a future transport
/// adapter should use. No transport exists in this workspace; this function
/// documents the contract such an adapter must honor.
pub fn http_status_hint(err: &CmsError) -> u16 {
    match err {
        CmsError::NotCreated
        | CmsError::NotFound(_)
        | CmsError::FileNotFound(_) => 404,
        CmsError::AlreadyCreated
        | CmsError::DuplicateUniqueName(_)
        | CmsError::Guarded(_) => 409,
        CmsError::EmptyName => 422,
        CmsError::StackCorrupted(_) | CmsError::Unconfigured(_) => 500,
        CmsError::UploadFailed(_) => 502,
    }
}


