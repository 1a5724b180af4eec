//! Acquisition errors.

use thiserror::Error;

use crate::download::DownloadError;
use crate::package::PackageError;
use crate::store::StoreError;

/// Failure of one acquisition stage, passed through unchanged.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// License check or purchase failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Artifact transfer failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Metadata injection failed.
    #[error(transparent)]
    Package(#[from] PackageError),
}

impl AcquireError {
    /// The storefront error, when the failure came from the protocol stage.
    #[must_use]
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(error) => Some(error),
            _ => None,
        }
    }
}
