//! Application services orchestrating domain logic and side effects.
pub mod files;
pub mod upload;

use crate::services::upload::UploadErrors;

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("missing required role")]
    Unauthorized,
    #[error("upload failed validation")]
    Validation(UploadErrors),
    #[error("invalid path")]
    InvalidPath,
    #[error("failed to look up existing entries")]
    Lookup(#[source] std::io::Error),
    #[error("failed to prepare storage")]
    StorageSetup(#[source] std::io::Error),
    #[error("failed to create folder")]
    CreateFolder(#[source] std::io::Error),
    #[error("failed to save file")]
    SaveFile(#[source] std::io::Error),
}
