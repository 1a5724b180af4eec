//! Device correlation identifier.
//!
//! The storefront ties a sign-in to the device that performed it, so the same
//! GUID must accompany every request made under one session.

use std::sync::OnceLock;

use rand::Rng;

/// Length of a device GUID in characters.
pub const GUID_LEN: usize = 12;

const ZERO_GUID: &str = "000000000000";
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Lazily generated, process-stable device GUID.
///
/// Initialization is atomic: concurrent first calls to [`DeviceGuid::get`]
/// observe the same value.
#[derive(Debug, Default)]
pub struct DeviceGuid {
    value: OnceLock<String>,
}

impl DeviceGuid {
    /// Creates an identifier that is generated on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an identifier seeded with a previously used value.
    ///
    /// Blank, all-zero or malformed seeds are ignored and a fresh value is
    /// generated on first use instead.
    #[must_use]
    pub fn with_seed(seed: &str) -> Self {
        let guid = Self::new();
        let candidate = seed.trim().to_ascii_uppercase();
        if is_usable(&candidate) {
            let _ = guid.value.set(candidate);
        }
        guid
    }

    /// Returns the identifier, generating it on first call.
    pub fn get(&self) -> &str {
        self.value.get_or_init(generate)
    }
}

fn is_usable(candidate: &str) -> bool {
    candidate.len() == GUID_LEN
        && candidate != ZERO_GUID
        && candidate.bytes().all(|byte| byte.is_ascii_hexdigit())
}

fn generate() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (0..GUID_LEN)
            .map(|_| char::from(HEX_UPPER[rng.gen_range(0..HEX_UPPER.len())]))
            .collect();
        if candidate != ZERO_GUID {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_guid_is_twelve_uppercase_hex() {
        let guid = DeviceGuid::new();
        let value = guid.get();
        assert_eq!(value.len(), GUID_LEN);
        assert!(
            value
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
        assert_ne!(value, ZERO_GUID);
    }

    #[test]
    fn test_guid_is_stable_across_calls() {
        let guid = DeviceGuid::new();
        let first = guid.get().to_string();
        assert_eq!(guid.get(), first);
    }

    #[test]
    fn test_seed_is_honored_and_uppercased() {
        let guid = DeviceGuid::with_seed("abcdef012345");
        assert_eq!(guid.get(), "ABCDEF012345");
    }

    #[test]
    fn test_zero_and_blank_seeds_are_regenerated() {
        for seed in [ZERO_GUID, "", "not-a-guid!!", "ABC"] {
            let guid = DeviceGuid::with_seed(seed);
            assert_ne!(guid.get(), ZERO_GUID);
            assert_eq!(guid.get().len(), GUID_LEN);
        }
    }

    #[test]
    fn test_concurrent_first_use_yields_one_value() {
        let guid = Arc::new(DeviceGuid::new());
        let values: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let guid = Arc::clone(&guid);
                    scope.spawn(move || guid.get().to_string())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(values.iter().all(|value| value == &values[0]));
    }
}
