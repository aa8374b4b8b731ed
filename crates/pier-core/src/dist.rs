//! Distribution filename grammar.
//!
//! Scanners meet artifacts as bare filenames; this module parses the two
//! distribution formats into a structured result instead of threading
//! exceptions through scan loops. Files that fail the grammar are skipped by
//! callers and recorded as warnings, never fatal.

use crate::version::Version;

/// Errors for filenames that do not match the distribution grammar.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilenameError {
    /// Not a `.whl` or `.tar.gz` file.
    #[error("unhandled file type: {filename:?}")]
    UnhandledType { filename: String },

    /// A wheel filename without the expected dash-separated fields.
    #[error("malformed wheel filename: {filename:?}")]
    MalformedWheel { filename: String },

    /// An sdist filename without a `name-version` stem.
    #[error("malformed sdist filename: {filename:?}")]
    MalformedSdist { filename: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistKind {
    /// Built distribution (`*.whl`, a zip archive).
    Wheel,
    /// Source distribution (`*.tar.gz`).
    Sdist,
}

impl DistKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DistKind::Wheel => "wheel",
            DistKind::Sdist => "sdist",
        }
    }
}

/// A distribution filename decomposed into its meaningful parts.
///
/// `project` is the raw distribution name exactly as spelled in the filename
/// (wheels spell separators as `_`); normalize it before using it as a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistFilename {
    pub filename: String,
    pub project: String,
    pub version: Version,
    pub kind: DistKind,
}

impl DistFilename {
    /// Parse `filename` according to the wheel / sdist naming rules.
    ///
    /// - wheels: `{dist}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
    /// - sdists: `{name}-{version}.tar.gz`
    pub fn parse(filename: &str) -> Result<Self, FilenameError> {
        if let Some(stem) = filename.strip_suffix(".whl") {
            return parse_wheel(filename, stem);
        }
        if let Some(stem) = filename.strip_suffix(".tar.gz") {
            return parse_sdist(filename, stem);
        }
        Err(FilenameError::UnhandledType {
            filename: filename.to_string(),
        })
    }
}

fn parse_wheel(filename: &str, stem: &str) -> Result<DistFilename, FilenameError> {
    let malformed = || FilenameError::MalformedWheel {
        filename: filename.to_string(),
    };

    let parts: Vec<&str> = stem.split('-').collect();
    // Five fields without a build tag, six with one. The distribution name
    // itself never contains a dash (the format escapes them to underscores).
    let (project, version, build) = match parts.as_slice() {
        [dist, version, _python, _abi, _platform] => (*dist, *version, None),
        [dist, version, build, _python, _abi, _platform] => (*dist, *version, Some(*build)),
        _ => return Err(malformed()),
    };

    if project.is_empty() || version.is_empty() {
        return Err(malformed());
    }
    // Build tags must start with a digit; this distinguishes a genuine build
    // tag from a dash accidentally left in a distribution name.
    if let Some(build) = build {
        if !build.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(malformed());
        }
    }

    Ok(DistFilename {
        filename: filename.to_string(),
        project: project.to_string(),
        version: Version::parse(version),
        kind: DistKind::Wheel,
    })
}

fn parse_sdist(filename: &str, stem: &str) -> Result<DistFilename, FilenameError> {
    // The version is everything after the rightmost dash; sdist names may
    // legitimately contain dashes themselves.
    let (project, version) = stem.rsplit_once('-').ok_or(FilenameError::MalformedSdist {
        filename: filename.to_string(),
    })?;

    if project.is_empty()
        || version.is_empty()
        || !version.starts_with(|c: char| c.is_ascii_digit() || c == 'v')
    {
        return Err(FilenameError::MalformedSdist {
            filename: filename.to_string(),
        });
    }

    Ok(DistFilename {
        filename: filename.to_string(),
        project: project.to_string(),
        version: Version::parse(version),
        kind: DistKind::Sdist,
    })
}
