//! The index engine: scans storage sources, builds immutable per-index
//! snapshots, and serves reads from them while refreshing in the background.
//!
//! The moving parts:
//!
//! - [`RefreshEngine`] owns the sources and the digest cache, rebuilds a
//!   source per refresh, and publishes the result.
//! - [`Registry`] holds the published [`IndexSnapshot`]s behind `Arc`s and
//!   swaps them copy-on-write; readers never block on a build.
//! - [`Query`] is the read facade the serving layer talks to, with typed
//!   absence errors.
//!
//! Snapshots are immutable once published: a refresh that fails leaves the
//! previous view in place, so readers see stale data rather than none.

mod builder;
mod query;
mod registry;
mod snapshot;

pub mod refresh;
#[cfg(feature = "watch-notify")]
pub mod watch;

pub use query::{IndexSummary, ProjectSummary, Query, QueryError, RegistryStats};
pub use refresh::{BuildOptions, ChangeEvent, RefreshEngine, RefreshError, RefreshOptions};
pub use registry::Registry;
pub use snapshot::{ArtifactRecord, IndexSnapshot, IndexStats, ProjectEntry};
