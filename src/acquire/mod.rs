//! Acquisition orchestration.
//!
//! An [`Acquirer`] takes a catalog id and a signed-in [`Account`] through
//! the license check, an optional purchase, the artifact transfer and the
//! metadata rewrite. Storefront calls run with the identity's cookies
//! installed and the session's identity slot held; the transfer and rewrite
//! run after the slot is released.
//!
//! [`Account`]: crate::auth::Account

mod error;
mod orchestrator;
mod request;

pub use error::AcquireError;
pub use orchestrator::Acquirer;
pub use request::{AcquireRequest, AcquiredArtifact, AcquisitionStage};
