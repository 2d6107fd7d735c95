//! Equipment config identity using type-prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Prefix carried by every equipment config id
pub const ID_PREFIX: &str = "EQP";

/// Opaque identity of an equipment config (`EQP-<ULID>`), assigned on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(Ulid);

impl ConfigId {
    /// Create a fresh id
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a ConfigId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Cheap check used to tell ids apart from equipment names on the command line
    pub fn looks_like_id(s: &str) -> bool {
        s.split_once('-')
            .is_some_and(|(prefix, rest)| prefix.eq_ignore_ascii_case(ID_PREFIX) && rest.len() == 26)
    }
}

impl Default for ConfigId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", ID_PREFIX, self.0)
    }
}

impl FromStr for ConfigId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        if !prefix.eq_ignore_ascii_case(ID_PREFIX) {
            return Err(IdParseError::InvalidPrefix(prefix.to_string()));
        }

        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self(ulid))
    }
}

impl Serialize for ConfigId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ConfigId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing config ids
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid id prefix: '{0}' (expected EQP)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in id: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}
