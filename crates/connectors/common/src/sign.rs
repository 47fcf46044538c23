//! Request signing shared by the REST connectors.
//!
//! Both supported exchanges authenticate signed requests with an
//! HMAC-SHA256 signature over a request-specific message, sent as a
//! lowercase hex string in a header. Only the message layout differs:
//!
//! - Delta signs `method + timestamp + path + query + body`.
//! - Bybit signs `timestamp + api_key + recv_window + payload`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature and return it as a lowercase hex string.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Current Unix timestamp in seconds, as a string (Delta convention).
pub fn timestamp_secs() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

/// Current Unix timestamp in milliseconds, as a string (Bybit convention).
pub fn timestamp_ms() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}
