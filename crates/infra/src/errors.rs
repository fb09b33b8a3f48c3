//! Error-kind -> HTTP status mapping for the infra layer.
//!
//! No HTTP transport exists in this workspace. This module documents the
//! contract a future transport adapter must honor, the same way
//! `cms_core::http_status_hint` documents it for domain errors.

use cms_core::error::http_status_hint as domain_status_hint;
use cms_core::CmsError;
use cms_imaging::ImagingError;
use cms_storage::StorageError;

use crate::event_store::EventStoreError;
use crate::repository::RepositoryError;

pub fn storage_status_hint(err: &StorageError) -> u16 {
    match err {
        StorageError::Unconfigured(_) => 500,
        StorageError::FileNotFound(_) => 404,
        StorageError::Io(_) => 502,
    }
}

pub fn imaging_status_hint(err: &ImagingError) -> u16 {
    match err {
        ImagingError::Storage(inner) => storage_status_hint(inner),
        ImagingError::Decode(_) | ImagingError::Encode(_) => 422,
        ImagingError::StackCorrupted(_) => 500,
        ImagingError::Cancelled => 499,
    }
}

pub fn event_store_status_hint(err: &EventStoreError) -> u16 {
    match err {
        EventStoreError::Concurrency(_) => 409,
        EventStoreError::AggregateTypeMismatch(_) | EventStoreError::InvalidAppend(_) => 400,
        EventStoreError::Publish(_) => 502,
    }
}

/// Maps the outer `RepositoryError<CmsError>` produced by
/// `AggregateRepository::use_aggregate` onto an HTTP status hint, falling
/// through to the wrapped domain error's own mapping.
pub fn repository_status_hint(err: &RepositoryError<CmsError>) -> u16 {
    match err {
        RepositoryError::Concurrency(_) => 409,
        RepositoryError::Domain(domain_err) => domain_status_hint(domain_err),
        RepositoryError::Deserialize(_) => 500,
        RepositoryError::Store(store_err) => event_store_status_hint(store_err),
        RepositoryError::Publish(_) => 502,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_pass_through_the_core_mapping() {
        let err: RepositoryError<CmsError> = RepositoryError::Domain(CmsError::NotFound("x".to_string()));
        assert_eq!(repository_status_hint(&err), 404);
    }

    #[test]
    fn concurrency_conflicts_map_to_409() {
        let err: RepositoryError<CmsError> = RepositoryError::Concurrency("stale version".to_string());
        assert_eq!(repository_status_hint(&err), 409);
    }

    #[test]
    fn cancelled_imaging_maps_to_499() {
        assert_eq!(imaging_status_hint(&ImagingError::Cancelled), 499);
    }
}
