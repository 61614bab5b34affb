// src/time.rs
use chrono::Utc;

/// RFC 3339 timestamp for stored records and API responses.
pub fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Unix seconds, used for token iat/exp claims.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
