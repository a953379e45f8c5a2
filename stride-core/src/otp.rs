//! OTP Hashing
//!
//! Challenges store `hex(SHA-256(pepper ":" mobile ":" code))`. Binding
//! the mobile number into the hash keeps a leaked hash from validating
//! for any other number.

use sha2::{Digest, Sha256};

use crate::constants::OTP_CODE_LENGTH;
use crate::error::{CoreError, CoreResult};
use crate::types::MobileNumber;

/// Hash a plaintext code for storage or comparison
pub fn hash_code(pepper: &str, mobile: &MobileNumber, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pepper.as_bytes());
    hasher.update(b":");
    hasher.update(mobile.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a user-entered code has the expected shape
pub fn check_code_shape(code: &str) -> CoreResult<()> {
    if code.len() == OTP_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CoreError::MalformedCode {
            expected_len: OTP_CODE_LENGTH,
        })
    }
}

/// Compare two hex digests without short-circuiting on the first mismatch
pub fn hashes_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
