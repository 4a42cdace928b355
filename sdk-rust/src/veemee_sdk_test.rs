//! Test doubles for code built on top of the SDK.
mod api;

pub use api::{MockCall, MockPersonasResult, MockVeemeeApi};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;

/// Build an unsigned JWT whose payload is `payload`. Good enough for the
/// client-side expiry checks in [`crate::jwt`].
#[must_use]
pub fn unsigned_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}
