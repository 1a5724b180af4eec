//! Storefront identity management.
//!
//! This module signs in with bounded retry and verification-code handling,
//! persists the resulting [`Account`] through a [`CredentialStore`], and
//! manages the identity's cookies within a shared
//! [`StoreSession`](crate::session::StoreSession).

mod account;
mod manager;
mod retry;
mod storage;

pub use account::{Account, StoreResponseSnapshot};
pub use manager::{SESSION_EXPIRY_WINDOW, SessionManager};
pub use retry::{
    AuthRetryPolicy, DEFAULT_AUTH_MAX_ATTEMPTS, DEFAULT_AUTH_RETRY_DELAY, RetryDecision,
};
pub use storage::{
    CredentialStore, EncryptedFileCredentialStore, KEYCHAIN_ACCOUNT, KEYCHAIN_SERVICE,
    KeyringCredentialStore, MASTER_KEY_ENV, MemoryCredentialStore, StorageError, config_dir,
};
