//! Content digests for artifacts, with a metadata-validated cache.
//!
//! Hashing large archives dominates refresh cost, so digests are computed by
//! streaming in bounded chunks (memory use is independent of artifact size)
//! and cached keyed by path, validated against the file's current size and
//! mtime. A change in either invalidates the entry.
//!
//! An unreadable artifact yields a [`DigestError`], which callers treat as
//! "hash unavailable": the artifact stays listed, just without digests.

mod cache;

pub use cache::DigestCache;

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

pub type Result<T> = std::result::Result<T, DigestError>;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown digest algorithm {name:?}")]
    UnknownAlgorithm { name: String },
}

/// The digest algorithms the engine can compute.
///
/// Only SHA-256 today; the enum exists so configuration can name algorithms
/// and wire documents can carry the algorithm label next to each digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(DigestError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// A digest stored as a lowercase hex string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Digest an arbitrary byte slice.
    pub fn from_bytes(algorithm: DigestAlgorithm, bytes: impl AsRef<[u8]>) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(bytes.as_ref());
                Self(hex::encode(hasher.finalize()))
            }
        }
    }

    /// Digest bytes read from `reader` in 64 KiB chunks.
    pub fn from_reader(algorithm: DigestAlgorithm, mut reader: impl Read) -> Result<Self> {
        match algorithm {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                let mut buf = [0_u8; 64 * 1024];
                loop {
                    let read = reader.read(&mut buf)?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&buf[..read]);
                }
                Ok(Self(hex::encode(hasher.finalize())))
            }
        }
    }

    /// Digest a file's contents without reading it into memory at once.
    pub fn from_file(algorithm: DigestAlgorithm, path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(algorithm, file)
    }

    /// Wrap an already-computed lowercase hex digest (e.g. one reported by a
    /// remote listing).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vectors() {
        assert_eq!(
            Digest::from_bytes(DigestAlgorithm::Sha256, b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            Digest::from_bytes(DigestAlgorithm::Sha256, b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reader_and_bytes_agree() {
        let data = vec![7_u8; 200_000];
        let from_bytes = Digest::from_bytes(DigestAlgorithm::Sha256, &data);
        let from_reader =
            Digest::from_reader(DigestAlgorithm::Sha256, std::io::Cursor::new(&data)).unwrap();
        assert_eq!(from_bytes, from_reader);
    }

    #[test]
    fn algorithm_parses_case_insensitively() {
        assert_eq!(
            "SHA256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert!(matches!(
            "md5".parse::<DigestAlgorithm>(),
            Err(DigestError::UnknownAlgorithm { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Digest::from_file(DigestAlgorithm::Sha256, "/nonexistent/artifact.whl")
            .unwrap_err();
        assert!(matches!(err, DigestError::Io(_)));
    }
}
