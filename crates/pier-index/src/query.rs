//! Read-side facade over the registry.
//!
//! Every method resolves against whatever snapshots are current at call
//! time and never blocks on a refresh in progress. Absence is typed: the
//! serving layer can map each variant to its own status without string
//! matching.

use std::collections::BTreeSet;
use std::sync::Arc;

use pier_core::simple::{ProjectDetail, ProjectList};
use pier_core::NormalizedName;
use serde::Serialize;
use time::OffsetDateTime;

use crate::registry::Registry;
use crate::snapshot::{ArtifactRecord, IndexSnapshot, IndexStats};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("no index named {index:?}")]
    IndexNotFound { index: String },

    #[error("no project {project:?} in index {index:?}")]
    ProjectNotFound { index: String, project: String },

    #[error("no file {filename:?} for project {project:?} in index {index:?}")]
    FileNotFound {
        index: String,
        project: String,
        filename: String,
    },
}

/// One index and its counters, for listings.
#[derive(Clone, Debug, Serialize)]
pub struct IndexSummary {
    pub name: String,
    #[serde(flatten)]
    pub stats: IndexStats,
}

/// One project and its counters, for listings.
#[derive(Clone, Debug, Serialize)]
pub struct ProjectSummary {
    pub name: NormalizedName,
    pub versions: usize,
    pub files: usize,
    pub total_size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
}

/// Counters over the whole registry. Each artifact is counted once, in its
/// home index, so aggregated parent views do not inflate the totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub indexes: usize,
    pub projects: usize,
    pub files: usize,
    pub total_size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
}

/// Read-only access to published snapshots.
#[derive(Clone)]
pub struct Query {
    registry: Arc<Registry>,
}

impl Query {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The current snapshot of `index`.
    pub fn index(&self, index: &str) -> Result<Arc<IndexSnapshot>, QueryError> {
        self.registry
            .snapshot(index)
            .ok_or_else(|| QueryError::IndexNotFound {
                index: index.to_string(),
            })
    }

    /// All indexes with their counters, in name order.
    pub fn indexes(&self) -> Vec<IndexSummary> {
        self.registry
            .snapshots()
            .iter()
            .map(|snapshot| IndexSummary {
                name: snapshot.name().to_string(),
                stats: snapshot.stats(),
            })
            .collect()
    }

    /// The project list document for one index.
    pub fn project_list(&self, index: &str) -> Result<ProjectList, QueryError> {
        Ok(self.index(index)?.to_project_list())
    }

    /// Per-project counters for one index, in name order.
    pub fn projects(&self, index: &str) -> Result<Vec<ProjectSummary>, QueryError> {
        let snapshot = self.index(index)?;
        Ok(snapshot
            .projects()
            .map(|entry| {
                let mut summary = ProjectSummary {
                    name: entry.name().clone(),
                    versions: entry.versions().len(),
                    files: entry.files().len(),
                    total_size: 0,
                    last_modified: None,
                };
                for file in entry.files() {
                    summary.total_size += file.size;
                    if file.modified > summary.last_modified {
                        summary.last_modified = file.modified;
                    }
                }
                summary
            })
            .collect())
    }

    /// The detail document for one project. `project` may be any spelling
    /// that normalizes to the project's name.
    pub fn project(&self, index: &str, project: &str) -> Result<ProjectDetail, QueryError> {
        let snapshot = self.index(index)?;
        let entry = self.entry(&snapshot, project)?;
        Ok(entry.to_detail())
    }

    /// One file of one project.
    pub fn file(
        &self,
        index: &str,
        project: &str,
        filename: &str,
    ) -> Result<ArtifactRecord, QueryError> {
        let snapshot = self.index(index)?;
        let entry = self.entry(&snapshot, project)?;
        entry
            .file(filename)
            .cloned()
            .ok_or_else(|| QueryError::FileNotFound {
                index: index.to_string(),
                project: entry.name().as_str().to_string(),
                filename: filename.to_string(),
            })
    }

    /// Counters over every published index.
    pub fn stats(&self) -> RegistryStats {
        let snapshots = self.registry.snapshots();
        let mut stats = RegistryStats {
            indexes: snapshots.len(),
            ..RegistryStats::default()
        };
        let mut projects = BTreeSet::new();
        for snapshot in &snapshots {
            for entry in snapshot.projects() {
                // Aggregated ancestor views repeat records; count a file only
                // in the snapshot it calls home.
                for file in entry.files().iter().filter(|f| f.index == snapshot.name()) {
                    projects.insert(entry.name().clone());
                    stats.files += 1;
                    stats.total_size += file.size;
                    if file.modified > stats.last_modified {
                        stats.last_modified = file.modified;
                    }
                }
            }
        }
        stats.projects = projects.len();
        stats
    }

    fn entry<'a>(
        &self,
        snapshot: &'a IndexSnapshot,
        project: &str,
    ) -> Result<&'a crate::snapshot::ProjectEntry, QueryError> {
        let not_found = || QueryError::ProjectNotFound {
            index: snapshot.name().to_string(),
            project: project.to_string(),
        };
        // A name that fails the grammar cannot name any project.
        let name = NormalizedName::new(project).map_err(|_| not_found())?;
        snapshot.project(&name).ok_or_else(not_found)
    }
}
