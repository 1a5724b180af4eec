//! Session cookie store and the persisted cookie-string format.
//!
//! Cookies are persisted with an identity as strings of the form
//! `name=value; domain=.apple.com; path=/; secure; expires=1767225600`.
//! [`SessionCookies`] is the live store the HTTP client reads and writes
//! through `reqwest`'s [`CookieStore`] trait. Storage, domain and path
//! matching and expiry follow RFC 6265 via the `cookie_store` crate.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cookie::time::OffsetDateTime;
use cookie_store::{CookieDomain, CookieExpiration, RawCookie};
use reqwest::Url;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use tracing::{debug, trace};

/// Registrable domain of the storefront vendor.
pub const VENDOR_DOMAIN: &str = "apple.com";

/// Domain assigned to persisted cookies that do not name one.
pub const DEFAULT_COOKIE_DOMAIN: &str = ".apple.com";

const DEFAULT_COOKIE_PATH: &str = "/";

/// One cookie held by the session.
///
/// The value is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Domain scope; a leading dot is tolerated.
    pub domain: String,
    /// Path scope.
    pub path: String,
    /// Only sent over HTTPS.
    pub secure: bool,
    /// Absolute expiry; `None` for session-scoped cookies.
    pub expires: Option<SystemTime>,
    value: String,
}

impl SessionCookie {
    /// Creates a session-scoped cookie.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            path: path.into(),
            secure: false,
            expires: None,
            value: value.into(),
        }
    }

    /// Sets the expiry.
    #[must_use]
    pub fn with_expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Marks the cookie HTTPS-only.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Returns the cookie value. Avoid logging it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when the cookie's domain contains the storefront vendor's domain.
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        is_vendor_domain(&self.domain)
    }

    /// True when the cookie has an expiry at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// True when the cookie expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: SystemTime, window: Duration) -> bool {
        self.expires
            .is_some_and(|expires| expires <= now + window)
    }

    /// True when [`to_cookie_string`](Self::to_cookie_string) output parses
    /// back into this cookie's name and value.
    #[must_use]
    pub fn persists_losslessly(&self) -> bool {
        let reserved = ['=', ';'];
        !self.name.is_empty()
            && !self.value.is_empty()
            && !self.name.contains(reserved)
            && !self.value.contains(reserved)
    }

    /// Serializes to the persisted cookie-string form.
    #[must_use]
    pub fn to_cookie_string(&self) -> String {
        let mut out = format!(
            "{}={}; domain={}; path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            out.push_str("; secure");
        }
        if let Some(seconds) = self
            .expires
            .and_then(|expires| expires.duration_since(UNIX_EPOCH).ok())
        {
            out.push_str(&format!("; expires={}", seconds.as_secs()));
        }
        out
    }

    fn from_stored(stored: &cookie_store::Cookie<'_>) -> Self {
        let domain = match &stored.domain {
            CookieDomain::Suffix(suffix) => format!(".{suffix}"),
            other => String::from(other),
        };
        let expires = match &stored.expires {
            CookieExpiration::AtUtc(at) => Some(SystemTime::from(*at)),
            CookieExpiration::SessionEnd => None,
        };
        Self {
            name: stored.name().to_string(),
            domain,
            path: String::from(&stored.path),
            secure: stored.secure().unwrap_or(false),
            expires,
            value: stored.value().to_string(),
        }
    }

    /// Builds the raw cookie plus an origin URL inside its domain and path,
    /// as if the cookie had been set by that origin.
    fn to_raw(&self) -> Option<(RawCookie<'static>, Url)> {
        let host = self.domain.trim_start_matches('.');
        let path = if self.path.starts_with('/') {
            self.path.as_str()
        } else {
            DEFAULT_COOKIE_PATH
        };
        let origin = Url::parse(&format!("https://{host}{path}")).ok()?;

        let mut builder = RawCookie::build((self.name.clone(), self.value.clone()))
            .domain(host.to_string())
            .path(path.to_string())
            .secure(self.secure);
        if let Some(expires) = self.expires {
            builder = builder.expires(OffsetDateTime::from(expires));
        }
        Some((builder.build(), origin))
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

fn is_vendor_domain(domain: &str) -> bool {
    domain.to_ascii_lowercase().contains(VENDOR_DOMAIN)
}

/// Parses an `expires` attribute: unix seconds or an HTTP-date.
fn parse_expiry(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(UNIX_EPOCH + Duration::from_secs(seconds));
    }
    httpdate::parse_http_date(value).ok()
}

/// Parses one persisted cookie string.
///
/// Components are separated by `;`; each `key=value` component must split
/// into exactly two parts. `domain`, `path`, `secure` and `expires` are
/// attributes; the remaining pair is the cookie itself. Returns `None` when
/// the name or value is missing.
#[must_use]
pub fn parse_cookie_string(raw: &str) -> Option<SessionCookie> {
    let mut pair: Option<(String, String)> = None;
    let mut domain = None;
    let mut path = None;
    let mut secure = false;
    let mut expires = None;

    for component in raw.split(';').map(str::trim) {
        if component.is_empty() {
            continue;
        }
        if component.eq_ignore_ascii_case("secure") {
            secure = true;
            continue;
        }
        let parts: Vec<&str> = component.split('=').map(str::trim).collect();
        let [key, value] = parts.as_slice() else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" => domain = Some((*value).to_string()),
            "path" => path = Some((*value).to_string()),
            "secure" => secure = true,
            "expires" => expires = parse_expiry(value),
            _ => pair = Some(((*key).to_string(), (*value).to_string())),
        }
    }

    let (name, value) = pair?;
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some(SessionCookie {
        name,
        domain: domain
            .filter(|domain| !domain.is_empty())
            .unwrap_or_else(|| DEFAULT_COOKIE_DOMAIN.to_string()),
        path: path
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_COOKIE_PATH.to_string()),
        secure,
        expires,
        value,
    })
}

/// The live cookie store shared by every storefront request of a session.
#[derive(Debug, Default)]
pub struct SessionCookies {
    store: RwLock<cookie_store::CookieStore>,
}

impl SessionCookies {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, cookie_store::CookieStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, cookie_store::CookieStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a cookie, replacing any cookie with the same name, domain and path.
    ///
    /// Returns `false` when the cookie was rejected, for example because it
    /// has already expired.
    pub fn insert(&self, cookie: &SessionCookie) -> bool {
        let Some((raw, origin)) = cookie.to_raw() else {
            debug!(name = %cookie.name, "cookie domain is not a valid host");
            return false;
        };
        match self.write().insert_raw(&raw, &origin) {
            Ok(_) => true,
            Err(error) => {
                debug!(name = %cookie.name, %error, "cookie rejected by store");
                false
            }
        }
    }

    /// Parses and installs persisted cookie strings; malformed entries are skipped.
    ///
    /// Returns the number of cookies installed.
    pub fn install_strings(&self, cookie_strings: &[String]) -> usize {
        let mut installed = 0;
        for raw in cookie_strings {
            match parse_cookie_string(raw) {
                Some(cookie) => {
                    if self.insert(&cookie) {
                        installed += 1;
                    }
                }
                None => debug!("skipping malformed persisted cookie"),
            }
        }
        installed
    }

    /// Drops every vendor cookie, then installs `cookie_strings`.
    pub fn replace_vendor(&self, cookie_strings: &[String]) -> usize {
        self.clear_vendor();
        self.install_strings(cookie_strings)
    }

    /// Drops every vendor cookie.
    pub fn clear_vendor(&self) {
        let mut store = self.write();
        let vendor: Vec<(String, String, String)> = store
            .iter_any()
            .filter(|cookie| is_vendor_domain(&String::from(&cookie.domain)))
            .map(|cookie| {
                (
                    String::from(&cookie.domain),
                    String::from(&cookie.path),
                    cookie.name().to_string(),
                )
            })
            .collect();
        for (domain, path, name) in vendor {
            store.remove(&domain, &path, &name);
        }
    }

    /// Copies of every unexpired cookie currently held.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionCookie> {
        self.read()
            .iter_unexpired()
            .map(SessionCookie::from_stored)
            .collect()
    }

    /// Copies of the vendor cookies currently held.
    #[must_use]
    pub fn vendor_cookies(&self) -> Vec<SessionCookie> {
        self.snapshot()
            .into_iter()
            .filter(SessionCookie::is_vendor)
            .collect()
    }

    /// Vendor cookies in persisted cookie-string form.
    #[must_use]
    pub fn vendor_cookie_strings(&self) -> Vec<String> {
        self.vendor_cookies()
            .iter()
            .inspect(|cookie| {
                if !cookie.persists_losslessly() {
                    debug!(
                        name = %cookie.name,
                        domain = %cookie.domain,
                        "vendor cookie will not survive a reload of the persisted identity"
                    );
                }
            })
            .map(SessionCookie::to_cookie_string)
            .collect()
    }

    /// True when a vendor cookie is session-scoped or unexpired at `now`.
    #[must_use]
    pub fn has_live_vendor_cookie(&self, now: SystemTime) -> bool {
        self.vendor_cookies()
            .iter()
            .any(|cookie| !cookie.is_expired_at(now))
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let received = cookie_headers
            .filter_map(|header| header.to_str().ok())
            .filter_map(|text| RawCookie::parse(text.to_owned()).ok())
            .inspect(|cookie| trace!(name = %cookie.name(), host = ?url.host_str(), "response cookie"));
        self.write().store_response_cookies(received, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}
