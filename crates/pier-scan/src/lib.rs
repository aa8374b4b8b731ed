//! Storage sources for the index engine.
//!
//! A [`ScanSource`] turns a storage backend into a finite, restartable stream
//! of [`RawArtifact`]s: re-invoking [`ScanSource::scan`] yields a fresh
//! sequence reflecting the storage's current state. Scanning is read-only.
//!
//! Two backends are provided: [`DirSource`] walks a local directory tree
//! (subdirectories become sub-indexes), and [`RemoteSource`] consumes the
//! JSON listing of an upstream simple index.
//!
//! Per-artifact problems (a filename that fails the distribution grammar, an
//! unreadable entry) surface as [`ScanWarning`] items in the stream so one
//! bad artifact never aborts a scan; only a failure to enumerate the source
//! at all is a [`ScanError`].

mod dir;
pub mod metadata;
mod remote;

pub use dir::DirSource;
pub use remote::RemoteSource;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use pier_core::DistFilename;
use time::OffsetDateTime;

/// Fatal scan failures: the source could not be enumerated at all.
///
/// The refresh engine responds by keeping the previous snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot read source directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("invalid listing from {url}: {message}")]
    InvalidListing { url: String, message: String },
}

/// A per-artifact problem recorded during a scan.
///
/// Warnings are carried through the build into the snapshot so operators can
/// see what was skipped, but they never fail a refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanWarning {
    /// Path or URL of the offending entry.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Where an artifact's content lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactLocation {
    Local(PathBuf),
    Remote,
}

/// One artifact as reported by a source, before index building.
#[derive(Clone, Debug)]
pub struct RawArtifact {
    /// Sub-index this artifact belongs to; empty string for the root index.
    pub index: String,
    /// Parsed distribution filename (project, version, kind).
    pub dist: DistFilename,
    pub size: u64,
    pub modified: Option<OffsetDateTime>,
    /// URL the serving layer hands out for this file. Local sources produce
    /// source-relative paths; remote sources keep the upstream URL.
    pub url: String,
    pub location: ArtifactLocation,
    /// Digests already known for this artifact (remote listings carry them;
    /// local artifacts are hashed during the build).
    pub known_hashes: BTreeMap<String, String>,
    pub requires_python: Option<String>,
}

/// An item in a scan stream: an artifact or a skipped-entry warning.
pub type ScanItem = Result<RawArtifact, ScanWarning>;

/// A storage backend the engine can index.
///
/// `scan` never mutates the backing store and may be re-invoked at any time
/// for a fresh view.
pub trait ScanSource: Send + Sync {
    /// Stable identifier for logs and error reports.
    fn describe(&self) -> String;

    /// Enumerate the source's artifacts.
    fn scan(&self) -> Result<Box<dyn Iterator<Item = ScanItem> + Send + '_>, ScanError>;
}
