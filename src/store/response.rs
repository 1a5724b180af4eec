//! Typed decoding of storefront responses.
//!
//! Each endpoint has one parse function taking the HTTP status and raw body.
//! Failure information in the body always wins over the status code.

use std::io::Cursor;

use plist::{Dictionary, Value};
use tracing::debug;

use super::constants::{CODE_REQUIRED_MESSAGE_FRAGMENT, CODE_REQUIRED_MESSAGE_KEY, DSID_KEYS};
use super::error::{LOCKED_FAILURE_TYPES, StoreError, classify_failure_type};
use super::item::{StoreItem, text_field};

const HTTP_OK: u16 = 200;

/// Account details from a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountInfo {
    /// Apple ID the storefront reports for the account.
    pub apple_id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// DSID reported inside `accountInfo`, if any.
    pub dsid: String,
    /// Country code reported inside `accountInfo`, if any.
    pub country_code: Option<String>,
    /// Storefront reported inside `accountInfo`, if any.
    pub storefront: Option<String>,
}

/// A successful sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Account details.
    pub account_info: AccountInfo,
    /// Session credential for authenticated requests.
    pub password_token: String,
    /// Resolved directory-services id.
    pub dsid: String,
    /// Storefront from the response headers, `accountInfo`, or the default.
    pub storefront: String,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("account_info", &self.account_info)
            .field("password_token", &"[REDACTED]")
            .field("dsid", &self.dsid)
            .field("storefront", &self.storefront)
            .finish()
    }
}

/// A successful license check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResponse {
    /// Artifact descriptors; never empty.
    pub items: Vec<StoreItem>,
    /// DSID echoed by the storefront, if any.
    pub dsid: Option<String>,
}

/// An accepted purchase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PurchaseResponse {
    /// Document type echoed by the storefront (`purchaseSuccess`), if any.
    pub jingle_doc_type: Option<String>,
    /// Confirmation message, if any.
    pub customer_message: Option<String>,
}

pub(crate) fn decode_dictionary(body: &[u8]) -> Result<Dictionary, StoreError> {
    if body.is_empty() {
        return Err(StoreError::invalid_response("empty body"));
    }
    let value = Value::from_reader(Cursor::new(body)).map_err(|error| {
        StoreError::invalid_response(format!("body is not a property list: {error}"))
    })?;
    value
        .into_dictionary()
        .ok_or_else(|| StoreError::invalid_response("property list root is not a dictionary"))
}

/// Decodes a body, mapping unreadable non-success bodies to a status error.
fn decode_for_status(status: u16, body: &[u8]) -> Result<Dictionary, StoreError> {
    decode_dictionary(body).map_err(|error| {
        if status == HTTP_OK {
            error
        } else {
            debug!(status, "non-success storefront response without plist body");
            StoreError::Server { status }
        }
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

pub(crate) fn is_code_required_message(message: &str) -> bool {
    message == CODE_REQUIRED_MESSAGE_KEY
        || message
            .to_ascii_lowercase()
            .contains(CODE_REQUIRED_MESSAGE_FRAGMENT)
}

/// First non-empty DSID found under the known keys.
pub(crate) fn resolve_dsid(dict: &Dictionary) -> Option<String> {
    DSID_KEYS
        .iter()
        .find_map(|key| non_empty(text_field(dict, key)))
}

/// Error described by the body of a failed response, if any.
fn failure_from_body(dict: &Dictionary) -> Option<StoreError> {
    let message = non_empty(text_field(dict, "customerMessage"));
    non_empty(text_field(dict, "failureType"))
        .map(|failure_type| classify_failure_type(&failure_type, message.as_deref()))
}

impl AccountInfo {
    fn from_dictionary(dict: &Dictionary) -> Self {
        let address = dict.get("address").and_then(Value::as_dictionary);
        let name_part = |key: &str| {
            address
                .and_then(|address| text_field(address, key))
                .unwrap_or_default()
        };
        Self {
            apple_id: text_field(dict, "appleId").unwrap_or_default(),
            first_name: name_part("firstName"),
            last_name: name_part("lastName"),
            dsid: resolve_dsid(dict).unwrap_or_default(),
            country_code: non_empty(text_field(dict, "countryCode")),
            storefront: non_empty(text_field(dict, "storeFront")),
        }
    }
}

/// Parses a sign-in response.
///
/// `header_storefront` is the storefront taken from response headers; the
/// caller supplies the default when none was sent.
pub(crate) fn parse_authenticate(
    status: u16,
    header_storefront: Option<String>,
    default_storefront: &str,
    body: &[u8],
) -> Result<AuthResponse, StoreError> {
    let dict = decode_for_status(status, body)?;

    let customer_message = non_empty(text_field(&dict, "customerMessage"));
    if customer_message
        .as_deref()
        .is_some_and(is_code_required_message)
    {
        return Err(StoreError::CodeRequired);
    }

    if let Some(failure_type) = non_empty(text_field(&dict, "failureType")) {
        if LOCKED_FAILURE_TYPES.contains(&failure_type.trim()) {
            return Err(StoreError::LockedAccount);
        }
        return Err(classify_failure_type(
            &failure_type,
            customer_message.as_deref(),
        ));
    }

    if status != HTTP_OK {
        return Err(StoreError::Server { status });
    }

    let account_info = dict
        .get("accountInfo")
        .and_then(Value::as_dictionary)
        .map(AccountInfo::from_dictionary)
        .ok_or_else(|| StoreError::invalid_response("missing accountInfo"))?;

    let password_token = non_empty(text_field(&dict, "passwordToken"))
        .ok_or_else(|| StoreError::invalid_response("missing passwordToken"))?;

    let dsid = resolve_dsid(&dict)
        .or_else(|| non_empty(Some(account_info.dsid.clone())))
        .ok_or_else(|| StoreError::invalid_response("missing DSID"))?;

    let storefront = non_empty(header_storefront)
        .or_else(|| account_info.storefront.clone())
        .unwrap_or_else(|| default_storefront.to_string());

    Ok(AuthResponse {
        account_info,
        password_token,
        dsid,
        storefront,
    })
}

/// Parses a license-check response. An empty `songList` means no license.
pub(crate) fn parse_download(status: u16, body: &[u8]) -> Result<DownloadResponse, StoreError> {
    let dict = decode_for_status(status, body)?;

    if status != HTTP_OK {
        return Err(failure_from_body(&dict).unwrap_or(StoreError::Server { status }));
    }

    let items: Vec<StoreItem> = dict
        .get("songList")
        .and_then(Value::as_array)
        .map(|songs| {
            songs
                .iter()
                .filter_map(Value::as_dictionary)
                .filter_map(StoreItem::from_dictionary)
                .collect()
        })
        .unwrap_or_default();

    if items.is_empty() {
        if let Some(error) = failure_from_body(&dict)
            && !matches!(error, StoreError::InvalidLicense)
        {
            return Err(error);
        }
        return Err(StoreError::InvalidLicense);
    }

    Ok(DownloadResponse {
        items,
        dsid: resolve_dsid(&dict),
    })
}

/// Parses a purchase response. A dialog or failure type on success means the
/// storefront wants a human in the loop.
pub(crate) fn parse_purchase(status: u16, body: &[u8]) -> Result<PurchaseResponse, StoreError> {
    let dict = decode_for_status(status, body)?;

    if status != HTTP_OK {
        return Err(failure_from_body(&dict).unwrap_or(StoreError::Server { status }));
    }

    if dict.contains_key("dialog") || dict.contains_key("failureType") {
        return Err(StoreError::UserInteractionRequired);
    }

    Ok(PurchaseResponse {
        jingle_doc_type: non_empty(text_field(&dict, "jingleDocType")),
        customer_message: non_empty(text_field(&dict, "customerMessage")),
    })
}
