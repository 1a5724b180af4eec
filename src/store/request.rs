//! Request body builders for the three storefront endpoints.
//!
//! Bodies are XML property-list dictionaries. Keys and constant values are
//! fixed by the storefront protocol.

use plist::{Dictionary, Value};

use super::error::StoreError;

/// Attempt marker sent when a verification code is appended to the password.
const ATTEMPT_WITH_CODE: i64 = 2;

/// Attempt marker sent for a plain password sign-in.
const ATTEMPT_WITHOUT_CODE: i64 = 4;

fn string(value: &str) -> Value {
    Value::String(value.to_string())
}

fn integer(value: i64) -> Value {
    Value::Integer(value.into())
}

/// Sign-in body. A verification code is concatenated onto the password.
pub(crate) fn authenticate_body(
    email: &str,
    password: &str,
    code: Option<&str>,
    guid: &str,
) -> Dictionary {
    let code = code.map(str::trim).filter(|code| !code.is_empty());
    let attempt = if code.is_some() {
        ATTEMPT_WITH_CODE
    } else {
        ATTEMPT_WITHOUT_CODE
    };

    let mut body = Dictionary::new();
    body.insert("appleId".to_string(), string(email));
    body.insert("attempt".to_string(), integer(attempt));
    body.insert("createSession".to_string(), string("true"));
    body.insert("guid".to_string(), string(guid));
    body.insert(
        "password".to_string(),
        Value::String(format!("{password}{}", code.unwrap_or_default())),
    );
    body.insert("rmp".to_string(), string("0"));
    body.insert("why".to_string(), string("signIn"));
    body
}

/// License-check body. Numeric version ids are sent as integers.
pub(crate) fn download_body(guid: &str, catalog_id: &str, version_id: Option<&str>) -> Dictionary {
    let mut body = Dictionary::new();
    body.insert("creditDisplay".to_string(), string(""));
    body.insert("guid".to_string(), string(guid));
    body.insert("salableAdamId".to_string(), string(catalog_id));
    if let Some(version_id) = version_id.map(str::trim).filter(|id| !id.is_empty()) {
        body.insert(
            "externalVersionId".to_string(),
            external_version_value(version_id),
        );
    }
    body
}

fn external_version_value(version_id: &str) -> Value {
    version_id
        .parse::<i64>()
        .map_or_else(|_| string(version_id), integer)
}

/// Purchase body for a free item.
pub(crate) fn purchase_body(
    guid: &str,
    catalog_id: &str,
    dsid: &str,
    password_token: &str,
) -> Dictionary {
    let mut body = Dictionary::new();
    for (key, value) in [
        ("appExtVrsId", "0"),
        ("buyWithoutAuthorization", "true"),
        ("hasAskedToFulfillPreorder", "true"),
        ("hasDoneAgeCheck", "true"),
        ("needDiv", "0"),
        ("origPageLocation", "Buy"),
        ("pg", "default"),
        ("price", "0"),
        ("pricingParameters", "STDQ"),
        ("productType", "C"),
        ("sd", "true"),
    ] {
        body.insert(key.to_string(), string(value));
    }
    body.insert("guid".to_string(), string(guid));
    body.insert("salableAdamId".to_string(), string(catalog_id));
    body.insert("dsPersonId".to_string(), string(dsid));
    body.insert("passwordToken".to_string(), string(password_token));
    body.insert(
        "origPage".to_string(),
        Value::String(format!("Software-{catalog_id}")),
    );
    body
}

/// Serializes a body dictionary as an XML property list.
pub(crate) fn encode_body(body: Dictionary) -> Result<Vec<u8>, StoreError> {
    let mut buffer = Vec::new();
    plist::to_writer_xml(&mut buffer, &Value::Dictionary(body)).map_err(|error| {
        StoreError::unknown(None, Some(format!("failed to encode request body: {error}")))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text<'a>(body: &'a Dictionary, key: &str) -> Option<&'a str> {
        body.get(key).and_then(Value::as_string)
    }

    #[test]
    fn test_authenticate_body_without_code() {
        let body = authenticate_body("user@example.com", "hunter2", None, "ABCDEF012345");
        assert_eq!(text(&body, "appleId"), Some("user@example.com"));
        assert_eq!(text(&body, "password"), Some("hunter2"));
        assert_eq!(
            body.get("attempt").and_then(Value::as_signed_integer),
            Some(4)
        );
        assert_eq!(text(&body, "guid"), Some("ABCDEF012345"));
        assert_eq!(text(&body, "why"), Some("signIn"));
        assert_eq!(text(&body, "createSession"), Some("true"));
    }

    #[test]
    fn test_authenticate_body_appends_code_to_password() {
        let body = authenticate_body("user@example.com", "hunter2", Some("123456"), "G");
        assert_eq!(text(&body, "password"), Some("hunter2123456"));
        assert_eq!(
            body.get("attempt").and_then(Value::as_signed_integer),
            Some(2)
        );
    }

    #[test]
    fn test_authenticate_body_blank_code_is_ignored() {
        let body = authenticate_body("user@example.com", "hunter2", Some("  "), "G");
        assert_eq!(text(&body, "password"), Some("hunter2"));
        assert_eq!(
            body.get("attempt").and_then(Value::as_signed_integer),
            Some(4)
        );
    }

    #[test]
    fn test_download_body_version_id_typing() {
        let numeric = download_body("G", "284882215", Some("851234567"));
        assert_eq!(
            numeric
                .get("externalVersionId")
                .and_then(Value::as_signed_integer),
            Some(851_234_567)
        );

        let textual = download_body("G", "284882215", Some("v-2"));
        assert_eq!(text(&textual, "externalVersionId"), Some("v-2"));

        let latest = download_body("G", "284882215", None);
        assert!(latest.get("externalVersionId").is_none());
        assert_eq!(text(&latest, "salableAdamId"), Some("284882215"));
        assert_eq!(text(&latest, "creditDisplay"), Some(""));
    }

    #[test]
    fn test_purchase_body_fields() {
        let body = purchase_body("G", "284882215", "8000001", "token-abc");
        assert_eq!(text(&body, "dsPersonId"), Some("8000001"));
        assert_eq!(text(&body, "passwordToken"), Some("token-abc"));
        assert_eq!(text(&body, "price"), Some("0"));
        assert_eq!(text(&body, "pricingParameters"), Some("STDQ"));
        assert_eq!(text(&body, "productType"), Some("C"));
        assert_eq!(text(&body, "origPage"), Some("Software-284882215"));
        assert_eq!(text(&body, "buyWithoutAuthorization"), Some("true"));
    }

    #[test]
    fn test_encode_body_is_xml_plist() {
        let bytes = encode_body(download_body("G", "1", None)).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<key>salableAdamId</key>"));
        assert!(xml.contains("<string>1</string>"));
    }
}
