//! Snap and invocation identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Unique, stable identifier for a loaded snap.
///
/// Snap ids are validated on construction: non-empty, and limited to
/// lowercase alphanumeric characters plus `-`, `.`, `_` and `:` (the `:`
/// allows namespaced ids such as `npm:example-snap`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SnapId(String);

impl<'de> Deserialize<'de> for SnapId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl SnapId {
    /// Create a new snap id, validating the raw string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSnapId`] if the id is empty or contains
    /// characters outside the allowed set.
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> CoreResult<()> {
        if id.is_empty() {
            return Err(CoreError::InvalidSnapId {
                id: id.to_string(),
                reason: "snap id must not be empty".to_string(),
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-._:".contains(c))
        {
            return Err(CoreError::InvalidSnapId {
                id: id.to_string(),
                reason: "snap id must contain only lowercase alphanumerics and -._:".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SnapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque, reference-unique handle for one running invocation into a snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Create a fresh invocation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invocation:{}", &self.0.to_string()[..8])
    }
}
