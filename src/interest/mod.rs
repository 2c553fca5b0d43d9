//! Interest identifiers.
//!
//! Chat rooms are keyed by the id of the interest they belong to. Ids are
//! 24-character hexadecimal strings; they are matched case-insensitively and
//! normalised to lowercase so `507F...` and `507f...` address the same room.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PresenceError;

/// Length of a well-formed interest id
pub const INTEREST_ID_LEN: usize = 24;

/// Validated, lowercase interest id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestId(String);

impl InterestId {
    /// Parse a raw id, rejecting anything that is not 24 hex characters
    pub fn parse(raw: &str) -> Result<Self, PresenceError> {
        if !is_valid_interest_id(raw) {
            return Err(PresenceError::InvalidFormat(
                "Invalid interest ID format".to_string(),
            ));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InterestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check the 24-hex-character shape without allocating
pub fn is_valid_interest_id(raw: &str) -> bool {
    raw.len() == INTEREST_ID_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit())
}
