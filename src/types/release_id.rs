// ABOUTME: Timestamp-derived release identifiers (YYYYMMDDHHMMSS).
// ABOUTME: Lexical order of identifiers matches chronological order.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// `strftime` format of a release identifier.
pub const RELEASE_ID_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseIdError {
    #[error("release id must be 14 digits (YYYYMMDDHHMMSS), got {0:?}")]
    Malformed(String),

    #[error("release id is not a valid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Identifier of one release directory under `releases/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(RELEASE_ID_FORMAT).to_string())
    }

    /// Parse an identifier, rejecting anything that is not a real timestamp.
    ///
    /// Release ids are interpolated into remote paths, so this is also the
    /// check that keeps `..` and shell metacharacters out of them.
    pub fn parse(value: &str) -> Result<Self, ReleaseIdError> {
        let value = value.trim();
        if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReleaseIdError::Malformed(value.to_string()));
        }
        NaiveDateTime::parse_from_str(value, RELEASE_ID_FORMAT)
            .map_err(|_| ReleaseIdError::InvalidTimestamp(value.to_string()))?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ReleaseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReleaseId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
