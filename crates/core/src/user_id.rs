//! User identifiers and sharded storage paths.
//!
//! Identifiers use a canonical form: **32 lowercase hexadecimal characters**, no hyphens. This is
//! what `Uuid::new_v4().simple().to_string()` produces. Externally supplied values (path
//! parameters, CLI flags) must already be canonical; hyphenated or uppercase forms are rejected
//! rather than normalised.
//!
//! For a canonical id `u`, user data lives under `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`, which
//! keeps any single directory from growing too large.

use crate::{StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Canonical user identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(Uuid);

impl UserId {
    /// Allocates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates an identifier that must already be canonical.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if `input` is not 32 lowercase hex characters.
    pub fn parse(input: &str) -> StoreResult<Self> {
        if Self::is_canonical(input) {
            if let Ok(uuid) = Uuid::parse_str(input) {
                return Ok(Self(uuid));
            }
        }
        Err(StoreError::InvalidInput(format!(
            "user id must be 32 lowercase hex characters without hyphens, got: '{}'",
            input
        )))
    }

    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>/`.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for UserId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserId::parse(s)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        UserId::parse(&s).map_err(serde::de::Error::custom)
    }
}
