//! Unverified JWT payload inspection. Signatures are checked by the API; the
//! client only needs the expiry and the email for display.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde_json::Value;

/// Seconds of slack applied when deciding whether a token is expired.
pub const DEFAULT_EXPIRY_SKEW_SECONDS: i64 = 30;

/// Decode the payload segment of a JWT. Returns `None` unless the token has
/// exactly three segments and the middle one is base64url-encoded JSON.
#[must_use]
pub fn decode_jwt_payload(token: &str) -> Option<Value> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The `exp` claim in seconds since the epoch, if present and numeric.
#[must_use]
pub fn expiry(token: &str) -> Option<i64> {
    let payload = decode_jwt_payload(token)?;
    let exp = payload.get("exp")?;
    #[allow(clippy::cast_possible_truncation)]
    exp.as_i64().or_else(|| exp.as_f64().map(|exp| exp as i64))
}

/// The `email` claim, if present.
#[must_use]
pub fn email(token: &str) -> Option<String> {
    decode_jwt_payload(token)?
        .get("email")?
        .as_str()
        .map(str::to_string)
}

/// Whether the token is expired, or will be within `skew_seconds`. Tokens that
/// cannot be decoded or carry no numeric `exp` count as expired.
#[must_use]
pub fn is_expired(token: &str, skew_seconds: i64) -> bool {
    match expiry(token) {
        Some(exp) => exp <= Utc::now().timestamp() + skew_seconds,
        None => true,
    }
}
