//! Package rewriting: injects `iTunesMetadata.plist` into a downloaded artifact.

mod error;
mod metadata;
mod repack;

pub use error::PackageError;
pub use metadata::{METADATA_FILE_NAME, PackageMetadata};
pub use repack::repackage;
