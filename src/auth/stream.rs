use crate::core::errors::BybitError;
use crate::ws::frame::OpFrame;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

/// How long the server accepts a freshly built auth frame, in milliseconds.
const AUTH_WINDOW_MS: u64 = 10_000;

/// Build the one-time authentication frame for a private realtime session.
///
/// The challenge is the literal `GET/realtime` followed by an expiry
/// timestamp; the signature is HMAC-SHA256 over that string, hex encoded.
/// Stream auth is always symmetric, regardless of which REST signing scheme
/// the same credentials use. The frame must be the first message sent after
/// the transport opens, before any subscribe.
pub fn auth_frame(api_key: &str, api_secret: &str, now_ms: u64) -> Result<OpFrame, BybitError> {
    let expires = now_ms + AUTH_WINDOW_MS;
    let challenge = format!("GET/realtime{}", expires);

    let mut mac = Hmac::<Sha256>::new_from_slice(api_secret.as_bytes())
        .map_err(|e| BybitError::Signing(format!("invalid HMAC key: {}", e)))?;
    mac.update(challenge.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(OpFrame {
        op: "auth".to_string(),
        args: vec![
            Value::String(api_key.to_string()),
            Value::from(expires),
            Value::String(signature),
        ],
    })
}
