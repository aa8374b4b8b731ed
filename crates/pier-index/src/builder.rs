//! Turns a scan stream into immutable snapshots.
//!
//! One build is one pass over a source's scan: artifacts are hashed (through
//! the shared digest cache), optionally opened for embedded metadata, grouped
//! by index and project, and frozen into [`IndexSnapshot`]s. A directory
//! source yields one snapshot per discovered sub-index plus one for the mount
//! itself; an index's snapshot aggregates its whole subtree, so the mount
//! snapshot lists every artifact the source reported.

use std::collections::BTreeMap;

use pier_core::{NormalizedName, Version};
use pier_digest::{Digest, DigestCache};
use pier_scan::{metadata, ArtifactLocation, RawArtifact, ScanError, ScanSource, ScanWarning};

use crate::snapshot::{ArtifactRecord, IndexSnapshot, ProjectEntry};
use crate::BuildOptions;

pub(crate) struct IndexBuilder<'a> {
    digests: &'a DigestCache,
    options: &'a BuildOptions,
}

impl<'a> IndexBuilder<'a> {
    pub(crate) fn new(digests: &'a DigestCache, options: &'a BuildOptions) -> Self {
        Self { digests, options }
    }

    /// Scan `source` and build a snapshot for every index found under
    /// `mount`. The mount's own snapshot is always present, even when the
    /// source is empty.
    pub(crate) fn build_source(
        &self,
        mount: &str,
        source: &dyn ScanSource,
    ) -> Result<Vec<IndexSnapshot>, ScanError> {
        let items = source.scan()?;
        let mut warnings = Vec::new();
        let mut records = Vec::new();
        for item in items {
            match item {
                Ok(artifact) => {
                    if let Some(record) = self.resolve(mount, artifact, &mut warnings) {
                        records.push(record);
                    }
                }
                Err(warning) => warnings.push(warning),
            }
        }
        Ok(self.assemble(mount, records, warnings))
    }

    /// Hash and enrich one scanned artifact into a record. `None` means the
    /// artifact was skipped with a warning.
    fn resolve(
        &self,
        mount: &str,
        artifact: RawArtifact,
        warnings: &mut Vec<ScanWarning>,
    ) -> Option<ArtifactRecord> {
        let project = match NormalizedName::new(&artifact.dist.project) {
            Ok(project) => project,
            Err(err) => {
                warnings.push(ScanWarning {
                    subject: artifact.dist.filename.clone(),
                    message: err.to_string(),
                });
                return None;
            }
        };

        let mut hashes = artifact.known_hashes;
        let mut requires_python = artifact.requires_python;
        let mut core_metadata = None;

        if let ArtifactLocation::Local(path) = &artifact.location {
            for &algorithm in &self.options.algorithms {
                match self.digests.digest_file(algorithm, path) {
                    Ok(digest) => {
                        hashes.insert(algorithm.as_str().to_string(), digest.as_str().to_string());
                    }
                    // The artifact stays listed without this digest.
                    Err(err) => warnings.push(ScanWarning {
                        subject: path.display().to_string(),
                        message: format!("cannot hash: {err}"),
                    }),
                }
            }

            if self.options.extract_metadata {
                match metadata::read_dist_metadata(path, &artifact.dist) {
                    Ok(meta) => {
                        if requires_python.is_none() {
                            requires_python = meta.requires_python;
                        }
                        core_metadata = Some(
                            self.options
                                .algorithms
                                .iter()
                                .map(|&algorithm| {
                                    let digest = Digest::from_bytes(algorithm, &meta.raw);
                                    (algorithm.as_str().to_string(), digest.as_str().to_string())
                                })
                                .collect(),
                        );
                    }
                    Err(err) => warnings.push(ScanWarning {
                        subject: path.display().to_string(),
                        message: format!("cannot read embedded metadata: {err}"),
                    }),
                }
            }
        }

        Some(ArtifactRecord {
            index: join_index(mount, &artifact.index),
            filename: artifact.dist.filename.clone(),
            project,
            display_name: artifact.dist.project.clone(),
            version: artifact.dist.version.clone(),
            kind: artifact.dist.kind,
            size: artifact.size,
            modified: artifact.modified,
            url: artifact.url,
            hashes,
            requires_python,
            core_metadata,
        })
    }

    /// Deduplicate, check digest conflicts, and freeze records into per-index
    /// snapshots. All warnings land on the mount snapshot.
    fn assemble(
        &self,
        mount: &str,
        records: Vec<ArtifactRecord>,
        mut warnings: Vec<ScanWarning>,
    ) -> Vec<IndexSnapshot> {
        // Within one index, the same filename reported twice keeps the most
        // recently modified copy.
        let mut by_key: BTreeMap<(String, String), ArtifactRecord> = BTreeMap::new();
        for record in records {
            let key = (record.index.clone(), record.filename.clone());
            match by_key.get(&key) {
                Some(existing) if existing.modified >= record.modified => {}
                _ => {
                    by_key.insert(key, record);
                }
            }
        }

        // Across indexes, a filename must name one set of bytes. The first
        // index (in name order) wins; later conflicting copies are dropped
        // with a warning so a poisoned mirror cannot shadow good content.
        let mut canonical_hashes: BTreeMap<String, (String, BTreeMap<String, String>)> =
            BTreeMap::new();
        let mut kept = Vec::new();
        for record in by_key.into_values() {
            match canonical_hashes.get(&record.filename) {
                Some((first_index, first_hashes))
                    if digests_conflict(first_hashes, &record.hashes) =>
                {
                    warnings.push(ScanWarning {
                        subject: format!("{}/{}", record.index, record.filename),
                        message: format!(
                            "content differs from the copy in index {first_index:?}; dropped"
                        ),
                    });
                }
                Some(_) => kept.push(record),
                None => {
                    canonical_hashes.insert(
                        record.filename.clone(),
                        (record.index.clone(), record.hashes.clone()),
                    );
                    kept.push(record);
                }
            }
        }

        // An artifact in `m/a/b` is visible from `m/a/b`, `m/a`, and `m`.
        let mut grouped: BTreeMap<String, BTreeMap<NormalizedName, Vec<ArtifactRecord>>> =
            BTreeMap::new();
        grouped.entry(mount.to_string()).or_default();
        for record in kept {
            for index in ancestors(mount, &record.index) {
                grouped
                    .entry(index)
                    .or_default()
                    .entry(record.project.clone())
                    .or_default()
                    .push(record.clone());
            }
        }

        let mut snapshots = Vec::with_capacity(grouped.len());
        for (index, projects) in grouped {
            let entries: BTreeMap<NormalizedName, ProjectEntry> = projects
                .into_iter()
                .map(|(name, files)| {
                    let entry = project_entry(name.clone(), files);
                    (name, entry)
                })
                .collect();
            let snapshot_warnings = if index == mount {
                std::mem::take(&mut warnings)
            } else {
                Vec::new()
            };
            snapshots.push(IndexSnapshot::new(index, entries, snapshot_warnings));
        }
        snapshots
    }
}

fn project_entry(name: NormalizedName, mut files: Vec<ArtifactRecord>) -> ProjectEntry {
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    let mut versions: Vec<Version> = files.iter().map(|f| f.version.clone()).collect();
    versions.sort_by(|a, b| b.cmp(a));
    versions.dedup();

    let display_name = files
        .first()
        .map(|f| f.display_name.clone())
        .unwrap_or_else(|| name.as_str().to_string());
    ProjectEntry::new(name, display_name, versions, files)
}

/// Two digest sets conflict when they disagree on any shared algorithm.
/// Records without a common algorithm cannot be compared and pass.
fn digests_conflict(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> bool {
    a.iter()
        .any(|(algorithm, digest)| b.get(algorithm).is_some_and(|other| other != digest))
}

fn join_index(mount: &str, sub: &str) -> String {
    match (mount.is_empty(), sub.is_empty()) {
        (_, true) => mount.to_string(),
        (true, false) => sub.to_string(),
        (false, false) => format!("{mount}/{sub}"),
    }
}

/// Index names from the mount down to the artifact's own index, inclusive.
fn ancestors(mount: &str, index: &str) -> Vec<String> {
    let mut names = vec![mount.to_string()];
    let sub = index.strip_prefix(mount).unwrap_or(index);
    let mut current = mount.to_string();
    for segment in sub.split('/').filter(|s| !s.is_empty()) {
        current = join_index(&current, segment);
        names.push(current.clone());
    }
    names
}
