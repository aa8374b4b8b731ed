//! Immutable index snapshots.
//!
//! A build produces an [`IndexSnapshot`] per index name: a frozen, fully
//! derived view of the artifacts that were on storage at scan time. Snapshots
//! are shared behind `Arc` and never mutated; a refresh produces new
//! snapshots and swaps them into the registry wholesale.

use std::collections::BTreeMap;

use pier_core::simple::{FileEntry, IndexMeta, ProjectDetail, ProjectList, ProjectRef};
use pier_core::{DistKind, NormalizedName, Version};
use pier_scan::ScanWarning;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One distribution file, fully resolved: hashed, located, and attributed to
/// a project and version.
#[derive(Clone, Debug)]
pub struct ArtifactRecord {
    /// Full name of the index this file lives in (`""` for the root).
    pub index: String,
    pub filename: String,
    pub project: NormalizedName,
    /// The project name as spelled in the filename.
    pub display_name: String,
    pub version: Version,
    pub kind: DistKind,
    pub size: u64,
    pub modified: Option<OffsetDateTime>,
    /// URL the serving layer hands out for this file.
    pub url: String,
    /// Digest algorithm name to lowercase hex digest.
    pub hashes: BTreeMap<String, String>,
    pub requires_python: Option<String>,
    /// Digests of the embedded metadata document, when it was extracted.
    pub core_metadata: Option<BTreeMap<String, String>>,
}

impl ArtifactRecord {
    /// Render this record as a listing file entry.
    pub fn to_file_entry(&self) -> FileEntry {
        FileEntry {
            filename: self.filename.clone(),
            size: self.size,
            url: self.url.clone(),
            hashes: self.hashes.clone(),
            requires_python: self.requires_python.clone(),
            core_metadata: self.core_metadata.clone(),
            upload_time: self
                .modified
                .and_then(|ts| ts.format(&Rfc3339).ok()),
        }
    }
}

/// All files of one project within one index.
#[derive(Clone, Debug)]
pub struct ProjectEntry {
    name: NormalizedName,
    /// One of the raw spellings behind `name`, for human-facing output.
    display_name: String,
    /// Distinct canonical versions, newest first.
    versions: Vec<Version>,
    /// All files, ordered by filename.
    files: Vec<ArtifactRecord>,
}

impl ProjectEntry {
    pub(crate) fn new(
        name: NormalizedName,
        display_name: String,
        versions: Vec<Version>,
        files: Vec<ArtifactRecord>,
    ) -> Self {
        Self {
            name,
            display_name,
            versions,
            files,
        }
    }

    pub fn name(&self) -> &NormalizedName {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn files(&self) -> &[ArtifactRecord] {
        &self.files
    }

    pub fn file(&self, filename: &str) -> Option<&ArtifactRecord> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn files_for_version<'a>(
        &'a self,
        version: &'a Version,
    ) -> impl Iterator<Item = &'a ArtifactRecord> {
        self.files
            .iter()
            .filter(move |f| f.version.canonical() == version.canonical())
    }

    /// Render this entry as a project detail document.
    pub fn to_detail(&self) -> ProjectDetail {
        ProjectDetail {
            meta: IndexMeta::default(),
            name: self.name.clone(),
            versions: self
                .versions
                .iter()
                .map(|v| v.as_str().to_string())
                .collect(),
            files: self.files.iter().map(ArtifactRecord::to_file_entry).collect(),
        }
    }
}

/// Aggregate counters for one index (or for the whole registry).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub projects: usize,
    pub files: usize,
    /// Sum of file sizes, in bytes.
    pub total_size: u64,
    /// Most recent modification time over all files.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
}

/// A frozen view of one index.
#[derive(Debug)]
pub struct IndexSnapshot {
    name: String,
    projects: BTreeMap<NormalizedName, ProjectEntry>,
    stats: IndexStats,
    warnings: Vec<ScanWarning>,
    /// Set by the registry when the snapshot is published; strictly
    /// increasing across swaps.
    pub(crate) generation: u64,
}

impl IndexSnapshot {
    pub(crate) fn new(
        name: String,
        projects: BTreeMap<NormalizedName, ProjectEntry>,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        let mut stats = IndexStats {
            projects: projects.len(),
            ..IndexStats::default()
        };
        for entry in projects.values() {
            for file in entry.files() {
                stats.files += 1;
                stats.total_size += file.size;
                if file.modified > stats.last_modified {
                    stats.last_modified = file.modified;
                }
            }
        }
        Self {
            name,
            projects,
            stats,
            warnings,
            generation: 0,
        }
    }

    /// Index name; empty string for the root index.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Problems recorded while scanning and building this snapshot.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    pub fn project(&self, name: &NormalizedName) -> Option<&ProjectEntry> {
        self.projects.get(name)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectEntry> {
        self.projects.values()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Render the project list document for this index.
    pub fn to_project_list(&self) -> ProjectList {
        ProjectList {
            meta: IndexMeta::default(),
            projects: self
                .projects
                .keys()
                .map(|name| ProjectRef { name: name.clone() })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(index: &str, filename: &str, size: u64) -> ArtifactRecord {
        let dist = pier_core::DistFilename::parse(filename).unwrap();
        ArtifactRecord {
            index: index.to_string(),
            filename: filename.to_string(),
            project: NormalizedName::new(&dist.project).unwrap(),
            display_name: dist.project.clone(),
            version: dist.version.clone(),
            kind: dist.kind,
            size,
            modified: Some(datetime!(2024-06-01 12:00 UTC)),
            url: filename.to_string(),
            hashes: BTreeMap::from([("sha256".to_string(), "ab".to_string())]),
            requires_python: None,
            core_metadata: None,
        }
    }

    #[test]
    fn stats_are_derived_at_construction() {
        let dist = record("", "demo-1.0.tar.gz", 100);
        let name = dist.project.clone();
        let entry = ProjectEntry::new(
            name.clone(),
            "demo".to_string(),
            vec![dist.version.clone()],
            vec![dist, record("", "demo-1.0-py3-none-any.whl", 200)],
        );
        let snapshot =
            IndexSnapshot::new(String::new(), BTreeMap::from([(name, entry)]), Vec::new());

        let stats = snapshot.stats();
        assert_eq!(stats.projects, 1);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.total_size, 300);
        assert_eq!(stats.last_modified, Some(datetime!(2024-06-01 12:00 UTC)));
    }

    #[test]
    fn file_entry_carries_rfc3339_upload_time() {
        let entry = record("", "demo-1.0.tar.gz", 10).to_file_entry();
        assert_eq!(entry.upload_time.as_deref(), Some("2024-06-01T12:00:00Z"));
        assert_eq!(entry.hashes["sha256"], "ab");
    }
}
