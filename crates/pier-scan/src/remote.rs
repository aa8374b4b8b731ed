//! Remote simple-index source.
//!
//! Mirrors an upstream index by consuming its JSON listing (PEP 691): one
//! request for the project list, then one per project for its file details.
//! Digests are taken verbatim from the listing; remote content is never
//! downloaded or rehashed.

use std::time::Duration;

use pier_core::simple::{ProjectDetail, ProjectList};
use pier_core::{DistFilename, FilenameError};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{ArtifactLocation, RawArtifact, ScanError, ScanItem, ScanSource, ScanWarning};

const JSON_ACCEPT: &str = "application/vnd.pypi.simple.v1+json";

/// An upstream simple index reached over HTTP.
#[derive(Clone)]
pub struct RemoteSource {
    base_url: String,
    agent: ureq::Agent,
}

impl RemoteSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ScanError> {
        let response = self
            .agent
            .get(url)
            .set("Accept", JSON_ACCEPT)
            .call()
            .map_err(|err| ScanError::Http {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        serde_json::from_reader(response.into_reader()).map_err(|err| ScanError::InvalidListing {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

impl ScanSource for RemoteSource {
    fn describe(&self) -> String {
        format!("remote:{}", self.base_url)
    }

    fn scan(&self) -> Result<Box<dyn Iterator<Item = ScanItem> + Send + '_>, ScanError> {
        let list_url = format!("{}/", self.base_url);
        let list: ProjectList = self.fetch_json(&list_url)?;
        tracing::debug!(
            target = "pier.scan",
            url = %list_url,
            projects = list.projects.len(),
            "fetched remote project list"
        );

        let mut items: Vec<ScanItem> = Vec::new();
        for project in &list.projects {
            let project_url = format!("{}/{}/", self.base_url, project.name);
            match self.fetch_json::<ProjectDetail>(&project_url) {
                Ok(detail) => {
                    items.extend(adapt_detail(&self.base_url, &project_url, detail));
                }
                // One unreachable project should not hide the rest of the
                // mirror; record it and keep going.
                Err(err) => items.push(Err(ScanWarning {
                    subject: project_url,
                    message: err.to_string(),
                })),
            }
        }
        Ok(Box::new(items.into_iter()))
    }
}

/// Convert one project's detail document into scan items.
fn adapt_detail(base_url: &str, project_url: &str, detail: ProjectDetail) -> Vec<ScanItem> {
    let mut items = Vec::with_capacity(detail.files.len());
    for file in detail.files {
        let dist = match DistFilename::parse(&file.filename) {
            Ok(dist) => dist,
            Err(FilenameError::UnhandledType { .. }) => continue,
            Err(err) => {
                items.push(Err(ScanWarning {
                    subject: format!("{project_url}{}", file.filename),
                    message: err.to_string(),
                }));
                continue;
            }
        };

        let modified = file
            .upload_time
            .as_deref()
            .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok());

        items.push(Ok(RawArtifact {
            index: String::new(),
            dist,
            size: file.size,
            modified,
            url: resolve_url(base_url, project_url, &file.url),
            location: ArtifactLocation::Remote,
            known_hashes: file.hashes,
            requires_python: file.requires_python,
        }));
    }
    items
}

/// Resolve a listing URL against the index it came from.
fn resolve_url(base_url: &str, project_url: &str, raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    if raw.starts_with('/') {
        if let Some(origin) = origin_of(base_url) {
            return format!("{origin}{raw}");
        }
    }
    format!("{project_url}{raw}")
}

/// `https://host[:port]` portion of a URL.
fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    match rest.find('/') {
        Some(path_start) => Some(&url[..scheme_end + 3 + path_start]),
        None => Some(url),
    }
}
