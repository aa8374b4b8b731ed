//! Simple-index document models (PEP 503 / PEP 691).
//!
//! These are the wire-facing shapes the serving layer renders. Field names
//! follow the JSON index format (kebab-case); filenames and digests must
//! round-trip byte-for-byte, so everything here is plain owned strings and
//! ordered maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::name::NormalizedName;

/// `meta` block carried by every index document (PEP 629 / PEP 700).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexMeta {
    pub api_version: String,
}

impl Default for IndexMeta {
    fn default() -> Self {
        Self {
            api_version: "1.1".to_string(),
        }
    }
}

/// One downloadable file within a project listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileEntry {
    pub filename: String,
    /// Size in bytes (PEP 700).
    pub size: u64,
    /// Absolute or index-relative download URL.
    pub url: String,
    /// Algorithm name to lowercase hex digest. May be empty when hashing
    /// failed; listings still function without digests.
    pub hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<String>,
    /// Digests of the embedded metadata document (PEP 658/714).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_metadata: Option<BTreeMap<String, String>>,
    /// ISO 8601 / RFC 3339 upload timestamp (PEP 700).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<String>,
}

/// Details for one project: `/simple/{name}/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub meta: IndexMeta,
    pub name: NormalizedName,
    /// Distinct version strings, ordered by version precedence descending.
    pub versions: Vec<String>,
    pub files: Vec<FileEntry>,
}

/// A single project reference in the index listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: NormalizedName,
}

/// The project index: `/simple/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectList {
    pub meta: IndexMeta,
    pub projects: Vec<ProjectRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entry_serializes_kebab_case_and_omits_empty_options() {
        let entry = FileEntry {
            filename: "pkg-1.0.tar.gz".to_string(),
            size: 100,
            url: "/files/pkg-1.0.tar.gz".to_string(),
            hashes: BTreeMap::from([("sha256".to_string(), "ab".repeat(32))]),
            requires_python: Some(">=3.9".to_string()),
            core_metadata: None,
            upload_time: None,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["requires-python"], ">=3.9");
        assert_eq!(json["hashes"]["sha256"], "ab".repeat(32));
        assert!(json.get("core-metadata").is_none());
        assert!(json.get("upload-time").is_none());
    }

    #[test]
    fn filenames_and_hashes_round_trip_exactly() {
        let entry = FileEntry {
            filename: "Weird_Name-1.0-py3-none-any.whl".to_string(),
            size: 1,
            url: "u".to_string(),
            hashes: BTreeMap::from([("sha256".to_string(), "00ff".to_string())]),
            requires_python: None,
            core_metadata: Some(BTreeMap::from([(
                "sha256".to_string(),
                "beef".to_string(),
            )])),
            upload_time: Some("2024-01-01T00:00:00Z".to_string()),
        };

        let json = serde_json::to_string(&entry).unwrap();
        let back: FileEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn project_list_carries_api_version() {
        let list = ProjectList {
            meta: IndexMeta::default(),
            projects: vec![ProjectRef {
                name: NormalizedName::new("demo").unwrap(),
            }],
        };
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["meta"]["api-version"], "1.1");
        assert_eq!(json["projects"][0]["name"], "demo");
    }
}
