//! Document key generation
//!
//! Keys are a random component followed by the creation timestamp, both in
//! lowercase base 36. There is no central allocator; uniqueness is
//! probabilistic. Storage engines detect the rare collision through their
//! primary-key constraint.

use chrono::Utc;
use uuid::Uuid;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a new document key
pub fn generate_key() -> String {
    let random = (Uuid::new_v4().as_u128() >> 64) as u64;
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("{}{}", to_base36(random), to_base36(millis))
}

/// Render an unsigned integer in lowercase base 36
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
