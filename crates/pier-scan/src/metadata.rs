//! Embedded distribution metadata.
//!
//! Wheels carry `{dist}-{version}.dist-info/METADATA` inside their zip;
//! sdists carry `{name}-{version}/PKG-INFO` inside their gzipped tar. Both
//! are RFC 822-style header documents. The engine extracts two things from
//! them: the `Requires-Python` specifier and the raw bytes (whose digest
//! becomes the PEP 658 `core-metadata` attribute).
//!
//! Extraction failures are per-artifact: callers downgrade them to warnings
//! and list the artifact without the optional fields.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use pier_core::{DistFilename, DistKind};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid wheel archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive is missing metadata entry {entry:?}")]
    MissingEntry { entry: String },
}

/// Core metadata read out of a distribution archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistMetadata {
    /// The raw metadata document, byte-for-byte.
    pub raw: Vec<u8>,
    pub requires_python: Option<String>,
}

/// Read the embedded metadata document from a local distribution file.
pub fn read_dist_metadata(
    path: &Path,
    dist: &DistFilename,
) -> Result<DistMetadata, MetadataError> {
    let raw = match dist.kind {
        DistKind::Wheel => read_wheel_metadata(path, &dist.filename)?,
        DistKind::Sdist => read_sdist_metadata(path, &dist.filename)?,
    };
    let requires_python = header_value(&raw, "requires-python");
    Ok(DistMetadata {
        raw,
        requires_python,
    })
}

fn read_wheel_metadata(path: &Path, filename: &str) -> Result<Vec<u8>, MetadataError> {
    // The dist-info directory is named after the first two dash-separated
    // fields of the wheel filename, verbatim.
    let mut fields = filename.splitn(3, '-');
    let entry = match (fields.next(), fields.next()) {
        (Some(distribution), Some(version)) => {
            format!("{distribution}-{version}.dist-info/METADATA")
        }
        _ => {
            return Err(MetadataError::MissingEntry {
                entry: "<dist-info>/METADATA".to_string(),
            })
        }
    };

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry_file = match archive.by_name(&entry) {
        Ok(entry_file) => entry_file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(MetadataError::MissingEntry { entry })
        }
        Err(err) => return Err(err.into()),
    };
    let mut raw = Vec::new();
    entry_file.read_to_end(&mut raw)?;
    Ok(raw)
}

fn read_sdist_metadata(path: &Path, filename: &str) -> Result<Vec<u8>, MetadataError> {
    let stem = filename.trim_end_matches(".tar.gz");
    let entry = format!("{stem}/PKG-INFO");

    let file = std::fs::File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for tar_entry in archive.entries()? {
        let mut tar_entry = tar_entry?;
        let matches = tar_entry
            .path()
            .map(|p| p.as_ref() == Path::new(&entry))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let mut raw = Vec::new();
        tar_entry.read_to_end(&mut raw)?;
        return Ok(raw);
    }
    Err(MetadataError::MissingEntry { entry })
}

/// Find an RFC 822 header value in the metadata preamble (the headers end at
/// the first blank line; everything after is the description body).
fn header_value(raw: &[u8], key: &str) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;
    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        // Continuation lines and malformed lines are skipped, not fatal.
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(key) {
            return Some(value.trim().to_string());
        }
    }
    None
}
