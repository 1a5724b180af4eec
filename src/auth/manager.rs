//! Sign-in with bounded retry, identity persistence and cookie lifecycle.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use super::account::Account;
use super::retry::{AuthRetryPolicy, RetryDecision};
use super::storage::CredentialStore;
use crate::session::{IdentityGuard, StoreSession, parse_cookie_string};
use crate::store::{StoreClient, StoreError};

/// Cookies expiring within this window mark a session as expiring.
pub const SESSION_EXPIRY_WINDOW: Duration = Duration::from_secs(300);

/// Owns sign-in and the lifecycle of the persisted identity.
pub struct SessionManager {
    session: Arc<StoreSession>,
    client: StoreClient,
    store: Arc<dyn CredentialStore>,
    retry_policy: AuthRetryPolicy,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("client", &self.client)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager with the default retry policy.
    #[must_use]
    pub fn new(
        session: Arc<StoreSession>,
        client: StoreClient,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            session,
            client,
            store,
            retry_policy: AuthRetryPolicy::default(),
        }
    }

    /// Replaces the sign-in retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: AuthRetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The shared session context.
    #[must_use]
    pub fn session(&self) -> &Arc<StoreSession> {
        &self.session
    }

    /// The storefront codec.
    #[must_use]
    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    /// Signs in and returns the new identity.
    ///
    /// Transient failures are retried per the retry policy. A verification
    /// challenge becomes [`StoreError::CodeRequired`] when no code was given
    /// and [`StoreError::InvalidCredentials`] when the given code was rejected.
    /// Locked accounts fail on the first attempt. The identity is saved to the
    /// credential store on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns the classified [`StoreError`] of the final attempt.
    #[instrument(skip(self, password, code), fields(email = %email))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        code: Option<&str>,
    ) -> Result<Account, StoreError> {
        let code = code.map(str::trim).filter(|code| !code.is_empty());
        let _identity = self.session.lock_identity().await;
        self.session.cookies().clear_vendor();

        let mut attempt = 1;
        loop {
            let error = match self
                .client
                .authenticate(&self.session, email, password, code)
                .await
            {
                Ok(response) => {
                    let cookies = self.session.cookies().vendor_cookie_strings();
                    let account = Account::from_authentication(email, &response, cookies);
                    info!(dsid = %account.dsid, region = %account.region.country_code, "signed in");
                    self.persist_best_effort(&account);
                    return Ok(account);
                }
                Err(StoreError::CodeRequired) if code.is_some() => {
                    debug!("verification code rejected");
                    return Err(StoreError::InvalidCredentials);
                }
                Err(error) => error,
            };

            match self.retry_policy.should_retry(&error, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(attempt, error = %error, "sign-in attempt failed; retrying");
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, %reason, "sign-in failed");
                    return Err(error);
                }
            }
        }
    }

    fn persist_best_effort(&self, account: &Account) {
        if let Err(error) = self.store.save(account) {
            warn!(error = %error, "failed to persist identity; continuing with in-memory session");
        }
    }

    /// Loads the saved identity. Store failures are logged and reported as `None`.
    #[must_use]
    pub fn load_saved(&self) -> Option<Account> {
        match self.store.load() {
            Ok(account) => account,
            Err(error) => {
                warn!(error = %error, "failed to load saved identity");
                None
            }
        }
    }

    /// Saves `account` to the credential store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Keychain`] when the store rejects the write.
    pub fn save(&self, account: &Account) -> Result<(), StoreError> {
        self.store
            .save(account)
            .map_err(|error| StoreError::keychain(error.to_string()))
    }

    /// Deletes the saved identity. Returns `true` when one was removed.
    pub fn delete(&self) -> bool {
        match self.store.delete() {
            Ok(removed) => removed,
            Err(error) => {
                warn!(error = %error, "failed to delete saved identity");
                false
            }
        }
    }

    /// Installs `account`'s cookies and reports whether any vendor cookie is
    /// still usable (session-scoped or unexpired).
    pub async fn validate(&self, account: &Account) -> bool {
        let _identity = self.session.activate(&account.cookies).await;
        self.session
            .cookies()
            .has_live_vendor_cookie(SystemTime::now())
    }

    /// True when any of `account`'s vendor cookies expires within five minutes.
    #[must_use]
    pub fn is_session_expiring(&self, account: &Account) -> bool {
        is_expiring_at(account, SystemTime::now())
    }

    /// Returns `account` carrying the vendor cookies currently in the session.
    ///
    /// The refreshed identity is saved on a best-effort basis.
    #[must_use]
    pub fn refresh_cookies(&self, account: &Account) -> Account {
        let refreshed = account
            .clone()
            .with_cookies(self.session.cookies().vendor_cookie_strings());
        debug!(cookies = refreshed.cookies.len(), "refreshed identity cookies");
        self.persist_best_effort(&refreshed);
        refreshed
    }

    /// Parses and installs cookie strings into the session store.
    ///
    /// Returns the number installed; malformed entries are skipped.
    pub fn set_active_cookies(&self, cookies: &[String]) -> usize {
        self.session.cookies().install_strings(cookies)
    }

    /// Makes `account` the active identity until the guard is dropped.
    pub async fn activate(&self, account: &Account) -> IdentityGuard<'_> {
        self.session.activate(&account.cookies).await
    }
}

fn is_expiring_at(account: &Account, now: SystemTime) -> bool {
    account
        .cookies
        .iter()
        .filter_map(|raw| parse_cookie_string(raw))
        .filter(|cookie| cookie.is_vendor())
        .any(|cookie| cookie.expires_within(now, SESSION_EXPIRY_WINDOW))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use std::time::UNIX_EPOCH;

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(StoreSession::new().unwrap()),
            StoreClient::new(),
            Arc::new(MemoryCredentialStore::new()),
        )
    }

    fn cookie_expiring_at(name: &str, at: SystemTime) -> String {
        let secs = at.duration_since(UNIX_EPOCH).unwrap().as_secs();
        format!("{name}=v; domain=.apple.com; path=/; expires={secs}")
    }

    #[test]
    fn test_is_expiring_within_window() {
        let now = SystemTime::now();
        let soon = Account::new("a@example.com", "1", "t", "143441")
            .with_cookies(vec![cookie_expiring_at("a", now + Duration::from_secs(60))]);
        assert!(is_expiring_at(&soon, now));

        let later = Account::new("a@example.com", "1", "t", "143441")
            .with_cookies(vec![cookie_expiring_at("a", now + Duration::from_secs(3600))]);
        assert!(!is_expiring_at(&later, now));
    }

    #[test]
    fn test_session_cookies_and_foreign_cookies_never_expiring() {
        let now = SystemTime::now();
        let account = Account::new("a@example.com", "1", "t", "143441").with_cookies(vec![
            "session=v; domain=.apple.com".to_string(),
            format!(
                "foreign=v; domain=example.org; expires={}",
                (now + Duration::from_secs(5))
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs()
            ),
        ]);
        assert!(!is_expiring_at(&account, now));
    }

    #[tokio::test]
    async fn test_validate_requires_live_vendor_cookie() {
        let manager = manager();
        let now = SystemTime::now();

        let expired = Account::new("a@example.com", "1", "t", "143441")
            .with_cookies(vec![cookie_expiring_at("a", now - Duration::from_secs(60))]);
        assert!(!manager.validate(&expired).await);

        let empty = Account::new("a@example.com", "1", "t", "143441");
        assert!(!manager.validate(&empty).await);

        let live = Account::new("a@example.com", "1", "t", "143441")
            .with_cookies(vec!["s=v; domain=.apple.com; path=/".to_string()]);
        assert!(manager.validate(&live).await);
    }

    #[test]
    fn test_set_active_cookies_and_refresh() {
        let manager = manager();
        let installed = manager.set_active_cookies(&[
            "a=1; domain=.apple.com; path=/".to_string(),
            "broken".to_string(),
        ]);
        assert_eq!(installed, 1);

        let account = Account::new("a@example.com", "1", "t", "143441");
        let refreshed = manager.refresh_cookies(&account);
        assert_eq!(refreshed.cookies.len(), 1);
        assert!(refreshed.cookies[0].starts_with("a=1"));
        assert_eq!(manager.load_saved(), Some(refreshed));
    }

    #[test]
    fn test_save_load_delete_round_trip() {
        let manager = manager();
        assert!(manager.load_saved().is_none());
        let account = Account::new("a@example.com", "1", "t", "143441");
        manager.save(&account).unwrap();
        assert_eq!(manager.load_saved(), Some(account));
        assert!(manager.delete());
        assert!(!manager.delete());
    }
}
