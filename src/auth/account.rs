//! The signed-in identity and its persisted form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{AuthResponse, RegionCode, StoreCredentials};

/// Fields of the sign-in response kept alongside the identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponseSnapshot {
    /// Directory-services id.
    pub dsid: String,
    /// Raw storefront value.
    pub storefront: String,
    password_token: String,
}

impl fmt::Debug for StoreResponseSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreResponseSnapshot")
            .field("dsid", &self.dsid)
            .field("storefront", &self.storefront)
            .field("password_token", &"[REDACTED]")
            .finish()
    }
}

/// A signed-in storefront identity.
///
/// The password token and cookies are redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name (`"First Last"`, or the email when the name is blank).
    pub name: String,
    /// Apple ID used to sign in.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Directory-services id.
    pub dsid: String,
    /// Session cookies in persisted cookie-string form.
    pub cookies: Vec<String>,
    /// Storefront region.
    pub region: RegionCode,
    /// Raw sign-in response fields.
    pub store_response: StoreResponseSnapshot,
    password_token: String,
}

impl Account {
    /// Creates an identity from its essential credentials.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        dsid: impl Into<String>,
        password_token: impl Into<String>,
        storefront: &str,
    ) -> Self {
        let email = email.into();
        let dsid = dsid.into();
        let password_token = password_token.into();
        let region = RegionCode::from_storefront(storefront);
        Self {
            name: email.clone(),
            email,
            first_name: String::new(),
            last_name: String::new(),
            cookies: Vec::new(),
            store_response: StoreResponseSnapshot {
                dsid: dsid.clone(),
                storefront: region.storefront.clone(),
                password_token: password_token.clone(),
            },
            region,
            dsid,
            password_token,
        }
    }

    /// Builds the identity produced by a successful sign-in.
    #[must_use]
    pub fn from_authentication(email: &str, response: &AuthResponse, cookies: Vec<String>) -> Self {
        let first_name = response.account_info.first_name.trim().to_string();
        let last_name = response.account_info.last_name.trim().to_string();
        let mut account = Self::new(
            email,
            response.dsid.clone(),
            response.password_token.clone(),
            &response.storefront,
        );
        account.name = display_name(&first_name, &last_name, email);
        account.first_name = first_name;
        account.last_name = last_name;
        account.cookies = cookies;
        account
    }

    /// Returns a copy carrying `cookies` instead of the current set.
    #[must_use]
    pub fn with_cookies(mut self, cookies: Vec<String>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Session credential for authenticated requests. Avoid logging it.
    #[must_use]
    pub fn password_token(&self) -> &str {
        &self.password_token
    }

    /// Credentials for the storefront codec.
    #[must_use]
    pub fn credentials(&self) -> StoreCredentials<'_> {
        StoreCredentials {
            dsid: &self.dsid,
            password_token: &self.password_token,
            storefront: &self.region.storefront,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("dsid", &self.dsid)
            .field("region", &self.region)
            .field("cookies", &format_args!("[{} redacted]", self.cookies.len()))
            .field("password_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let joined = format!("{first_name} {last_name}");
    let joined = joined.trim();
    if joined.is_empty() {
        email.to_string()
    } else {
        joined.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AccountInfo;

    fn response(first: &str, last: &str) -> AuthResponse {
        AuthResponse {
            account_info: AccountInfo {
                first_name: first.to_string(),
                last_name: last.to_string(),
                ..AccountInfo::default()
            },
            password_token: "token-xyz".to_string(),
            dsid: "8000001".to_string(),
            storefront: "143465-19,29".to_string(),
        }
    }

    #[test]
    fn test_from_authentication_builds_display_name_and_region() {
        let account = Account::from_authentication(
            "ada@example.com",
            &response("Ada", "Lovelace"),
            vec!["a=b".to_string()],
        );
        assert_eq!(account.name, "Ada Lovelace");
        assert_eq!(account.dsid, "8000001");
        assert_eq!(account.region.country_code, "CN");
        assert_eq!(account.store_response.storefront, "143465-19,29");
        assert_eq!(account.password_token(), "token-xyz");
        assert_eq!(account.cookies, vec!["a=b".to_string()]);
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let account =
            Account::from_authentication("ada@example.com", &response(" ", ""), Vec::new());
        assert_eq!(account.name, "ada@example.com");

        let first_only =
            Account::from_authentication("ada@example.com", &response("Ada", ""), Vec::new());
        assert_eq!(first_only.name, "Ada");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let account = Account::new("ada@example.com", "1", "token-secret", "143441")
            .with_cookies(vec!["session=cookie-secret".to_string()]);
        let debug = format!("{account:?}");
        assert!(!debug.contains("token-secret"));
        assert!(!debug.contains("cookie-secret"));
    }

    #[test]
    fn test_serde_round_trip_keeps_token() {
        let account = Account::new("ada@example.com", "1", "token", "143441-1,29");
        let json = serde_json::to_string(&account).unwrap();
        let restored: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, account);
        assert_eq!(restored.password_token(), "token");
    }

    #[test]
    fn test_credentials_borrow_identity_fields() {
        let account = Account::new("ada@example.com", "42", "token", "143441-1,29");
        let credentials = account.credentials();
        assert_eq!(credentials.dsid, "42");
        assert_eq!(credentials.password_token, "token");
        assert_eq!(credentials.storefront, "143441-1,29");
    }
}
