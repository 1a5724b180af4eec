//! Error types for package rewriting.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while rewriting a downloaded package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// File system error while unpacking or repacking.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be read or written.
    #[error("archive error in {path}: {source}")]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The metadata property list could not be serialized.
    #[error("failed to encode package metadata: {source}")]
    Metadata {
        /// The underlying plist error.
        #[source]
        source: plist::Error,
    },

    /// The blocking worker running the rewrite failed.
    #[error("package rewrite task failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
}

impl PackageError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an archive error.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_error_display_includes_path() {
        let error = PackageError::io(
            "/tmp/app.ipa",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(error.to_string().contains("/tmp/app.ipa"));

        let error = PackageError::archive("/tmp/app.ipa", zip::result::ZipError::FileNotFound);
        assert!(error.to_string().starts_with("archive error in /tmp/app.ipa"));
    }
}
