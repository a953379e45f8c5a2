//! Identifier Types
//!
//! Newtypes keep user ids, mobile numbers and transaction ids from being
//! swapped at call sites.

use serde::{Deserialize, Serialize};

use crate::constants::{MOBILE_MAX_DIGITS, MOBILE_MIN_DIGITS};
use crate::error::{CoreError, CoreResult};

/// Stable user identifier supplied by the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(format!("user:{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Normalised mobile number (digits only, country code included if given)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MobileNumber(String);

impl MobileNumber {
    /// Normalise user input: drop spaces, dashes, parentheses and a leading `+`
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let mut digits = String::with_capacity(without_plus.len());
        for c in without_plus.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' => {}
                other => {
                    return Err(CoreError::InvalidMobileNumber {
                        reason: format!("unexpected character '{}'", other),
                    })
                }
            }
        }

        if digits.len() < MOBILE_MIN_DIGITS || digits.len() > MOBILE_MAX_DIGITS {
            return Err(CoreError::InvalidMobileNumber {
                reason: format!(
                    "expected {}-{} digits, got {}",
                    MOBILE_MIN_DIGITS,
                    MOBILE_MAX_DIGITS,
                    digits.len()
                ),
            });
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs: last four digits only
    pub fn masked(&self) -> String {
        let visible = &self.0[self.0.len().saturating_sub(4)..];
        format!("******{}", visible)
    }
}

impl std::fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only transaction identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub uuid::Uuid);

impl TransactionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// OTP challenge identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub uuid::Uuid);

impl ChallengeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "otp:{}", self.0)
    }
}
