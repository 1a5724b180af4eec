//! Acquisition request, result and stage types.

use std::fmt;
use std::path::PathBuf;

use crate::store::StoreItem;

/// Stages an acquisition moves through.
///
/// `CheckingLicense → Downloading → Repackaging → Done`, with a
/// `Purchasing` detour and one more `CheckingLicense` when the identity holds
/// no license and purchasing was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionStage {
    CheckingLicense,
    Purchasing,
    Downloading,
    Repackaging,
    Done,
}

impl fmt::Display for AcquisitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CheckingLicense => "checking-license",
            Self::Purchasing => "purchasing",
            Self::Downloading => "downloading",
            Self::Repackaging => "repackaging",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What to acquire and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    /// Catalog id of the item.
    pub catalog_id: String,
    /// External version id; `None` for the latest version.
    pub version_id: Option<String>,
    /// Output file or directory; `None` for the working directory.
    pub output_path: Option<PathBuf>,
    /// Acquire a license first when the identity has none.
    pub purchase_if_needed: bool,
}

impl AcquireRequest {
    /// Requests the latest version of `catalog_id` into the working directory.
    #[must_use]
    pub fn new(catalog_id: impl Into<String>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            version_id: None,
            output_path: None,
            purchase_if_needed: false,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    #[must_use]
    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    #[must_use]
    pub fn purchase_if_needed(mut self, purchase: bool) -> Self {
        self.purchase_if_needed = purchase;
        self
    }
}

/// A downloaded and repackaged artifact.
#[derive(Debug, Clone)]
pub struct AcquiredArtifact {
    /// Final path of the package.
    pub path: PathBuf,
    /// Descriptor the artifact was fetched from. Carries the signature
    /// blobs a signing step needs.
    pub item: StoreItem,
    /// Whether a license was acquired along the way.
    pub purchased: bool,
    /// Bytes transferred.
    pub bytes_downloaded: u64,
}
