//! Error types for storefront protocol operations.
//!
//! Every failure surfaced by the codec, the session manager and the
//! acquisition orchestrator is one of these variants. Callers branch on
//! [`StoreError::disposition`] instead of matching message text.

use thiserror::Error;

/// Failure types the storefront uses for a wrong Apple ID or password.
const INVALID_CREDENTIAL_FAILURE_TYPES: &[&str] = &["-5000", "2034"];

/// Failure type the storefront uses when an item id does not resolve.
const INVALID_ITEM_FAILURE_TYPE: &str = "2042";

/// Failure type returned when the account has no license for the item.
const NO_LICENSE_FAILURE_TYPE: &str = "9610";

/// Failure types that mean the account has been disabled or locked.
pub const LOCKED_FAILURE_TYPES: &[&str] = &["5020", "5002"];

/// Errors produced by the storefront protocol layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure (DNS, connect, TLS, timeout, truncated body).
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// Endpoint that failed.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded or lacked required fields.
    #[error("invalid storefront response: {reason}")]
    InvalidResponse {
        /// What was wrong with the body.
        reason: String,
    },

    /// The storefront rejected the sign-in for an unclassified reason.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Wrong Apple ID, password or verification code.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A second-factor verification code must be supplied.
    #[error("a verification code is required to sign in")]
    CodeRequired,

    /// The account is locked or disabled.
    #[error("account is locked or disabled")]
    LockedAccount,

    /// The identity holds no license for the requested item.
    #[error("no license on file for this item")]
    InvalidLicense,

    /// The storefront wants an interactive confirmation (terms, dialog, payment).
    #[error("purchase requires confirmation in the official storefront")]
    UserInteractionRequired,

    /// The catalog item or bundle id could not be resolved.
    #[error("invalid item: {reason}")]
    InvalidItem {
        /// Why the item is invalid.
        reason: String,
    },

    /// The credential store failed to persist the identity.
    #[error("credential store error: {message}")]
    Keychain {
        /// Description of the storage failure.
        message: String,
    },

    /// Non-success HTTP status with no storefront failure information.
    #[error("storefront returned HTTP {status}")]
    Server {
        /// The HTTP status code.
        status: u16,
    },

    /// A failure type or message that maps to no known variant.
    #[error("unknown storefront error{}", unknown_suffix(.failure_type.as_deref(), .message.as_deref()))]
    Unknown {
        /// Raw failure type, if the storefront sent one.
        failure_type: Option<String>,
        /// Raw customer message, if the storefront sent one.
        message: Option<String>,
    },
}

/// How a caller should react to a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Retrying the same request may succeed.
    Transient,
    /// The caller must prompt for a verification code.
    NeedsCode,
    /// The stored identity is no longer usable; sign in again.
    NeedsReauthentication,
    /// Retrying will not help.
    Terminal,
}

impl StoreError {
    /// Creates a network error for an endpoint.
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates an invalid item error.
    pub fn invalid_item(reason: impl Into<String>) -> Self {
        Self::InvalidItem {
            reason: reason.into(),
        }
    }

    /// Creates a credential store error.
    pub fn keychain(message: impl Into<String>) -> Self {
        Self::Keychain {
            message: message.into(),
        }
    }

    /// Creates an unknown error carrying the raw storefront fields.
    pub fn unknown(failure_type: Option<String>, message: Option<String>) -> Self {
        Self::Unknown {
            failure_type,
            message,
        }
    }

    /// Classifies the error for retry and prompting decisions.
    #[must_use]
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::Network { .. } | Self::InvalidResponse { .. } => ErrorDisposition::Transient,
            Self::CodeRequired => ErrorDisposition::NeedsCode,
            Self::AuthenticationFailed | Self::InvalidCredentials => {
                ErrorDisposition::NeedsReauthentication
            }
            Self::LockedAccount
            | Self::InvalidLicense
            | Self::UserInteractionRequired
            | Self::InvalidItem { .. }
            | Self::Keychain { .. }
            | Self::Server { .. }
            | Self::Unknown { .. } => ErrorDisposition::Terminal,
        }
    }

    /// Returns true when retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.disposition() == ErrorDisposition::Transient
    }
}

fn unknown_suffix(failure_type: Option<&str>, message: Option<&str>) -> String {
    match (failure_type, message) {
        (Some(code), Some(text)) => format!(" ({code}): {text}"),
        (Some(code), None) => format!(" ({code})"),
        (None, Some(text)) => format!(": {text}"),
        (None, None) => String::new(),
    }
}

/// Maps a storefront `failureType` (plus optional customer message) to an error.
///
/// Lock codes are checked by callers before reaching here for sign-in, but
/// are recognized here too so every endpoint reports them the same way.
#[must_use]
pub fn classify_failure_type(failure_type: &str, customer_message: Option<&str>) -> StoreError {
    let code = failure_type.trim();
    if LOCKED_FAILURE_TYPES.contains(&code) {
        return StoreError::LockedAccount;
    }
    if INVALID_CREDENTIAL_FAILURE_TYPES.contains(&code) {
        return StoreError::InvalidCredentials;
    }
    if code == NO_LICENSE_FAILURE_TYPE {
        return StoreError::InvalidLicense;
    }
    if code == INVALID_ITEM_FAILURE_TYPE {
        return StoreError::invalid_item(
            customer_message.unwrap_or("item not found in storefront catalog"),
        );
    }
    if code.is_empty() {
        return StoreError::AuthenticationFailed;
    }
    StoreError::unknown(
        Some(code.to_string()),
        customer_message.map(ToString::to_string),
    )
}
