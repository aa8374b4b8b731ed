//! Local directory source.

use std::path::{Path, PathBuf};

use pier_core::{DistFilename, FilenameError};
use time::OffsetDateTime;
use walkdir::WalkDir;

use crate::{ArtifactLocation, RawArtifact, ScanError, ScanItem, ScanSource, ScanWarning};

/// A directory tree of distribution files.
///
/// Files directly under the root belong to the unnamed root index; files in
/// subdirectories belong to a sub-index named by the relative directory path
/// (`/`-separated). Ignored directories are pruned whole.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
    ignore: Vec<PathBuf>,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: Vec::new(),
        }
    }

    /// Prune these root-relative directories from scans.
    pub fn with_ignored(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ignore = dirs.into_iter().collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        self.ignore.iter().any(|dir| relative.starts_with(dir))
    }
}

impl ScanSource for DirSource {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn scan(&self) -> Result<Box<dyn Iterator<Item = ScanItem> + Send + '_>, ScanError> {
        // Surface an unreadable root as a fatal error up front instead of an
        // empty sequence; an empty index must mean an empty directory.
        std::fs::read_dir(&self.root).map_err(|source| ScanError::RootUnreadable {
            path: self.root.clone(),
            source,
        })?;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && self.is_ignored(entry.path())));

        Ok(Box::new(walker.filter_map(|entry| self.read_entry(entry))))
    }
}

impl DirSource {
    fn read_entry(
        &self,
        entry: Result<walkdir::DirEntry, walkdir::Error>,
    ) -> Option<ScanItem> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let subject = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string());
                return Some(Err(ScanWarning {
                    subject,
                    message: format!("walk error: {err}"),
                }));
            }
        };
        if !entry.file_type().is_file() {
            return None;
        }

        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return Some(Err(ScanWarning {
                subject: path.display().to_string(),
                message: "filename is not valid UTF-8".to_string(),
            }));
        };

        let dist = match DistFilename::parse(filename) {
            Ok(dist) => dist,
            // Not a distribution at all (README, signature files, ...):
            // silently irrelevant, matching how serving trees mix in
            // auxiliary files.
            Err(FilenameError::UnhandledType { .. }) => {
                tracing::debug!(
                    target = "pier.scan",
                    path = %path.display(),
                    "ignoring non-distribution file"
                );
                return None;
            }
            Err(err) => {
                return Some(Err(ScanWarning {
                    subject: path.display().to_string(),
                    message: err.to_string(),
                }));
            }
        };

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                return Some(Err(ScanWarning {
                    subject: path.display().to_string(),
                    message: format!("cannot stat: {err}"),
                }));
            }
        };

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let index = relative
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| slash_join(parent))
            .unwrap_or_default();
        let url = slash_join(relative);
        let modified = meta.modified().ok().map(OffsetDateTime::from);

        Some(Ok(RawArtifact {
            index,
            dist,
            size: meta.len(),
            modified,
            url,
            location: ArtifactLocation::Local(path.to_path_buf()),
            known_hashes: Default::default(),
            requires_python: None,
        }))
    }
}

fn slash_join(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pier_core::DistKind;

    fn artifacts(source: &DirSource) -> (Vec<RawArtifact>, Vec<ScanWarning>) {
        let mut ok = Vec::new();
        let mut warnings = Vec::new();
        for item in source.scan().unwrap() {
            match item {
                Ok(artifact) => ok.push(artifact),
                Err(warning) => warnings.push(warning),
            }
        }
        (ok, warnings)
    }

    #[test]
    fn walks_root_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pkg-1.0.tar.gz"), vec![0; 100]).unwrap();
        std::fs::create_dir(dir.path().join("extras")).unwrap();
        std::fs::write(
            dir.path().join("extras/other-2.0-py3-none-any.whl"),
            vec![0; 200],
        )
        .unwrap();

        let source = DirSource::new(dir.path());
        let (found, warnings) = artifacts(&source);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(found.len(), 2);

        let sdist = found
            .iter()
            .find(|a| a.dist.kind == DistKind::Sdist)
            .unwrap();
        assert_eq!(sdist.index, "");
        assert_eq!(sdist.url, "pkg-1.0.tar.gz");
        assert_eq!(sdist.size, 100);
        assert!(sdist.modified.is_some());

        let wheel = found
            .iter()
            .find(|a| a.dist.kind == DistKind::Wheel)
            .unwrap();
        assert_eq!(wheel.index, "extras");
        assert_eq!(wheel.url, "extras/other-2.0-py3-none-any.whl");
    }

    #[test]
    fn malformed_distribution_names_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good-1.0.tar.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("nodash.tar.gz"), b"x").unwrap();
        // Not a distribution type at all: skipped without a warning.
        std::fs::write(dir.path().join("README.md"), b"x").unwrap();

        let source = DirSource::new(dir.path());
        let (found, warnings) = artifacts(&source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dist.filename, "good-1.0.tar.gz");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].subject.ends_with("nodash.tar.gz"));
    }

    #[test]
    fn ignored_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("staging")).unwrap();
        std::fs::write(dir.path().join("staging/hidden-1.0.tar.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("kept-1.0.tar.gz"), b"x").unwrap();

        let source =
            DirSource::new(dir.path()).with_ignored([PathBuf::from("staging")]);
        let (found, warnings) = artifacts(&source);
        assert!(warnings.is_empty());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dist.filename, "kept-1.0.tar.gz");
    }

    #[test]
    fn rescanning_yields_a_fresh_view() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pkg-1.0.tar.gz"), b"x").unwrap();

        let source = DirSource::new(dir.path());
        let (first, _) = artifacts(&source);
        assert_eq!(first.len(), 1);

        std::fs::write(dir.path().join("pkg-2.0.tar.gz"), b"y").unwrap();
        let (second, _) = artifacts(&source);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn missing_root_is_fatal() {
        let source = DirSource::new("/definitely/not/a/real/root");
        assert!(matches!(
            source.scan().err(),
            Some(ScanError::RootUnreadable { .. })
        ));
    }
}
