//! Time-based rotating codes (RFC 6238, 6 digits, 30 second steps).
//!
//! The generator is keyed directly by the secret's bytes. Callers that need
//! a tolerance for clock skew use [`codes_in_window`], which yields the
//! previous, current and next code.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

pub const TIME_STEP_SECS: u64 = 30;
pub const CODE_DIGITS: u32 = 6;

fn hotp(secret: &[u8], counter: u64) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let truncated = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = truncated % 10u32.pow(CODE_DIGITS);
    format!("{:0width$}", code, width = CODE_DIGITS as usize)
}

/// The code for the time step containing `unix_secs`, shifted by
/// `step_offset` steps.
pub fn code_at(secret: &str, unix_secs: u64, step_offset: i64) -> String {
    let step = (unix_secs / TIME_STEP_SECS) as i64 + step_offset;
    hotp(secret.as_bytes(), step.max(0) as u64)
}

/// Previous, current and next code for the given moment.
pub fn codes_in_window(secret: &str, unix_secs: u64) -> [String; 3] {
    [
        code_at(secret, unix_secs, -1),
        code_at(secret, unix_secs, 0),
        code_at(secret, unix_secs, 1),
    ]
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
