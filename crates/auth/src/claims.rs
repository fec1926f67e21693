use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Permission, PermissionSet};

/// Standard alphabet, padding optional, trailing bits tolerated.
///
/// Token payloads are URL-safe and usually unpadded; after the character
/// substitution in [`decode_claims`] they are decoded with this engine.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Claims carried in the payload segment of an access token.
///
/// Read without signature verification: the issuing authority is solely
/// responsible for integrity. Every field is optional; a token that cannot
/// be decoded has no claims at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Capability identifiers granted to the bearer.
    #[serde(default)]
    pub permissions: Option<Vec<Permission>>,

    /// Expiry, in seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<f64>,
}

impl TokenClaims {
    pub fn permission_set(&self) -> PermissionSet {
        self.permissions.iter().flatten().cloned().collect()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|exp| DateTime::from_timestamp_millis((exp * 1000.0) as i64))
    }

    /// Expired when there is no `exp`, or when `exp * 1000` (seconds scaled to
    /// milliseconds) is strictly before `now` in milliseconds.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp * 1000.0 < now.timestamp_millis() as f64,
            None => true,
        }
    }
}

#[derive(Debug, Error)]
enum DecodeFailure {
    #[error("token does not have exactly three segments")]
    Shape,

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("payload is not a claims object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the claims of an access token.
///
/// Total over all inputs: any failure (wrong shape, bad base64, invalid
/// UTF-8, unexpected JSON) yields `None`. Failures are logged at debug level
/// and never surfaced.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    match try_decode(token) {
        Ok(claims) => Some(claims),
        Err(reason) => {
            tracing::debug!(%reason, "access token claims unavailable");
            None
        }
    }
}

fn try_decode(token: &str) -> Result<TokenClaims, DecodeFailure> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return Err(DecodeFailure::Shape),
    };

    let standard: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE.decode(standard)?;
    let text = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&text)?)
}

/// Whether `token` should be treated as expired at `now`.
///
/// True when there is no token, when its claims cannot be decoded, when it
/// carries no `exp`, or when `exp` has passed.
pub fn is_token_expired(token: Option<&str>, now: DateTime<Utc>) -> bool {
    token
        .and_then(decode_claims)
        .is_none_or(|claims| claims.is_expired_at(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::json;

    fn token_with(payload: &serde_json::Value) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.c2lnbmF0dXJl",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn decodes_permissions_and_expiry() {
        let token = token_with(&json!({
            "sub": "42",
            "permissions": ["users.read", "users.write"],
            "exp": 1_900_000_000
        }));

        let claims = decode_claims(&token).expect("claims should decode");
        assert_eq!(claims.exp, Some(1_900_000_000.0));
        let names: Vec<String> = claims
            .permission_set()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(names, vec!["users.read", "users.write"]);
    }

    #[test]
    fn reverses_url_safe_substitutions() {
        let payload = json!({ "permissions": ["~~~~~~", "??????"] });
        let encoded = URL_SAFE_NO_PAD.encode(payload.to_string());
        assert!(encoded.contains('-') || encoded.contains('_'));

        let claims = decode_claims(&format!("h.{encoded}.s")).expect("claims should decode");
        assert_eq!(claims.permission_set().len(), 2);
    }

    #[test]
    fn padded_payload_is_accepted() {
        let encoded = URL_SAFE.encode(json!({ "exp": 5 }).to_string());
        let claims = decode_claims(&format!("h.{encoded}.s")).expect("claims should decode");
        assert_eq!(claims.exp, Some(5.0));
    }

    #[test]
    fn missing_fields_are_absent() {
        let claims = decode_claims(&token_with(&json!({ "sub": "x" }))).unwrap();
        assert_eq!(claims, TokenClaims::default());
        assert!(claims.permission_set().is_empty());
    }

    #[test]
    fn malformed_tokens_have_no_claims() {
        for token in [
            "",
            "not-a-token",
            "a.b",
            "a.b.c.d",
            "header.!!!!.sig",
            "header.//8.sig",
            "header.bnVsbA.sig",
            "header.WzEsMiwzXQ.sig",
        ] {
            assert_eq!(decode_claims(token), None, "token {token:?} should not decode");
        }
    }

    #[test]
    fn wrongly_typed_claims_have_no_claims() {
        assert_eq!(decode_claims(&token_with(&json!({ "permissions": "admin" }))), None);
        assert_eq!(decode_claims(&token_with(&json!({ "permissions": [1, 2] }))), None);
        assert_eq!(decode_claims(&token_with(&json!({ "exp": "tomorrow" }))), None);
    }

    #[test]
    fn expiry_follows_seconds_to_millis_conversion() {
        let now = Utc::now();
        let past = token_with(&json!({ "exp": (now - Duration::seconds(1)).timestamp() }));
        let future = token_with(&json!({ "exp": (now + Duration::minutes(5)).timestamp() }));
        let no_exp = token_with(&json!({ "permissions": ["a"] }));

        assert!(is_token_expired(Some(&past), now));
        assert!(!is_token_expired(Some(&future), now));
        assert!(is_token_expired(Some(&no_exp), now));
        assert!(is_token_expired(None, now));
        assert!(is_token_expired(Some("garbage"), now));
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let at_now = TokenClaims { permissions: None, exp: Some(1_700_000_000.0) };
        let just_before = TokenClaims { permissions: None, exp: Some(1_699_999_999.999) };

        assert!(!at_now.is_expired_at(now));
        assert!(just_before.is_expired_at(now));
        assert_eq!(at_now.expires_at(), Some(now));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: arbitrary strings never panic the decoder and are always
        /// treated as expired.
        #[test]
        fn arbitrary_strings_degrade_to_expired(token in any::<String>()) {
            let now = Utc::now();
            let _ = decode_claims(&token);
            prop_assert!(is_token_expired(Some(&token), now));
        }

        /// Property: token-shaped strings built from the URL-safe alphabet
        /// never panic the decoder.
        #[test]
        fn token_shaped_garbage_is_total(
            header in "[A-Za-z0-9_-]{0,24}",
            payload in "[A-Za-z0-9_=-]{0,48}",
            signature in "[A-Za-z0-9_-]{0,24}",
        ) {
            let token = format!("{header}.{payload}.{signature}");
            let _ = decode_claims(&token);
            prop_assert!(is_token_expired(Some(&token), Utc::now()));
        }

        /// Property: a well-formed segment whose bytes are not JSON has no claims.
        #[test]
        fn non_json_payloads_have_no_claims(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
            let token = format!("h.{}.s", URL_SAFE_NO_PAD.encode(&bytes));
            prop_assert_eq!(decode_claims(&token), None);
        }
    }
}
