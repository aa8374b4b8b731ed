//! Project name validation and normalization.
//!
//! Lookups throughout the engine are keyed by [`NormalizedName`] so that the
//! spellings a packaging ecosystem treats as equivalent (`My-Project`,
//! `my_project`, `my.project`) all resolve to the same entry. The original
//! casing is carried separately in display fields and never used as a key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced when validating a raw project name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NameError {
    #[error("project name is empty")]
    Empty,

    /// The name does not match the `[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?`
    /// grammar (PEP 508 names).
    #[error("invalid project name {name:?}")]
    Invalid { name: String },
}

/// A normalized project name: lowercase, with runs of `-`, `_` and `.`
/// collapsed to a single `-` (PEP 503).
///
/// Stored as a plain string so it can serve directly as a map key and a wire
/// value; construction goes through [`NormalizedName::new`] which validates
/// the raw spelling first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedName(String);

impl NormalizedName {
    /// Validate `raw` against the name grammar and normalize it.
    pub fn new(raw: &str) -> Result<Self, NameError> {
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if !is_valid_raw_name(raw) {
            return Err(NameError::Invalid {
                name: raw.to_string(),
            });
        }
        Ok(Self(normalize(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn is_valid_raw_name(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_alphanumeric();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Collapse separator runs and lowercase.
///
/// Deterministic and total over validated names; callers that need the raw
/// spelling keep it themselves.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.chars() {
        if matches!(ch, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('-');
        }
        pending_separator = false;
        out.push(ch.to_ascii_lowercase());
    }
    out
}
