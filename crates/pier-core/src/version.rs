//! Package version parsing and precedence ordering.
//!
//! Versions sort by packaging-ecosystem precedence (PEP 440), not lexically:
//! pre-releases order before the final release of the same base version, dev
//! releases before pre-releases, post-releases after the final release.
//!
//! The parser covers the practical subset of the grammar seen in real
//! distribution filenames: optional epoch (`1!`), dotted release segments,
//! pre-release (`a`/`b`/`rc` and their aliases), `.postN`, `.devN`, and a
//! `+local` label. Text that does not match is still representable: legacy
//! versions order below every parsed version and compare between themselves
//! by raw text, so the overall order stays total.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A package version with a total precedence order.
///
/// The raw text is preserved for display; equality and ordering go through
/// the parsed key, so `1.0` and `1.0.0` compare equal while displaying
/// differently.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Version {
    raw: String,
    key: VersionKey,
}

impl Version {
    /// Parse `raw` into a version. Total: unrecognized text becomes a legacy
    /// version rather than an error.
    pub fn parse(raw: &str) -> Self {
        let key = match parse_pep440(raw) {
            Some(key) => VersionKey::Pep440(key),
            None => VersionKey::Legacy(raw.trim().to_ascii_lowercase()),
        };
        Self {
            raw: raw.to_string(),
            key,
        }
    }

    /// Whether the raw text matched the version grammar.
    pub fn is_legacy(&self) -> bool {
        matches!(self.key, VersionKey::Legacy(_))
    }

    /// Whether this is a pre-release or dev release.
    pub fn is_prerelease(&self) -> bool {
        match &self.key {
            VersionKey::Legacy(_) => false,
            VersionKey::Pep440(key) => {
                !matches!(key.pre, PreKey::Final) || matches!(key.dev, DevKey::Dev(_))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The normalized rendering: lowercase, canonical phase spellings, no
    /// leading zeros in numeric segments. Used as the version key inside
    /// snapshots so `1.0rc1` and `1.0c1` group together.
    pub fn canonical(&self) -> String {
        match &self.key {
            VersionKey::Legacy(raw) => raw.clone(),
            VersionKey::Pep440(key) => key.render(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl From<String> for Version {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Legacy orders below every parsed version (variant order matters).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionKey {
    Legacy(String),
    Pep440(Pep440Key),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Pep440Key {
    epoch: u64,
    release: Release,
    pre: PreKey,
    post: PostKey,
    dev: DevKey,
    /// Local labels have richer rules in the full grammar; a string tiebreak
    /// is enough to keep the order total here.
    local: String,
}

impl Pep440Key {
    fn render(&self) -> String {
        let mut out = String::new();
        if self.epoch != 0 {
            out.push_str(&format!("{}!", self.epoch));
        }
        let release: Vec<String> = self.release.0.iter().map(u64::to_string).collect();
        out.push_str(&release.join("."));
        if let PreKey::Pre(phase, n) = &self.pre {
            out.push_str(&format!("{}{}", phase.as_str(), n));
        }
        if let PostKey::Post(n) = &self.post {
            out.push_str(&format!(".post{}", n));
        }
        if let DevKey::Dev(n) = &self.dev {
            out.push_str(&format!(".dev{}", n));
        }
        if !self.local.is_empty() {
            out.push('+');
            out.push_str(&self.local);
        }
        out
    }
}

/// Release segments compare with implicit zero padding: `1.0` == `1.0.0`.
#[derive(Clone, Debug)]
struct Release(Vec<u64>);

impl PartialEq for Release {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Release {}

impl PartialOrd for Release {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Release {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

/// `1.0.dev1 < 1.0a1 < 1.0` (variant order matters).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    /// No pre-release marker but a dev marker: orders below all pre-releases.
    BareDev,
    Pre(PrePhase, u64),
    Final,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PrePhase {
    Alpha,
    Beta,
    Rc,
}

impl PrePhase {
    fn as_str(self) -> &'static str {
        match self {
            PrePhase::Alpha => "a",
            PrePhase::Beta => "b",
            PrePhase::Rc => "rc",
        }
    }
}

/// `1.0 < 1.0.post1` (variant order matters).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PostKey {
    None,
    Post(u64),
}

/// `1.0.dev1 < 1.0` (variant order matters).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Release,
}

fn parse_pep440(input: &str) -> Option<Pep440Key> {
    let lowered = input.trim().to_ascii_lowercase();
    let mut rest = lowered.strip_prefix('v').unwrap_or(&lowered);

    if rest.is_empty() {
        return None;
    }

    // Epoch: `N!`.
    let mut epoch = 0;
    if let Some(bang) = rest.find('!') {
        epoch = rest[..bang].parse().ok()?;
        rest = &rest[bang + 1..];
    }

    // Release segments: `N(.N)*`.
    let mut release = Vec::new();
    loop {
        let digits = take_digits(rest)?;
        release.push(digits.0);
        rest = digits.1;
        match rest.strip_prefix('.') {
            // A dot must be followed by another digit to be a release
            // separator; `.post1` / `.dev0` are handled below.
            Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
            _ => break,
        }
    }

    let mut pre = PreKey::Final;
    if let Some((phase, n, after)) = take_phase(
        rest,
        &[
            ("alpha", PrePhase::Alpha),
            ("a", PrePhase::Alpha),
            ("beta", PrePhase::Beta),
            ("b", PrePhase::Beta),
            ("rc", PrePhase::Rc),
            ("preview", PrePhase::Rc),
            ("pre", PrePhase::Rc),
            ("c", PrePhase::Rc),
        ],
    ) {
        pre = PreKey::Pre(phase, n);
        rest = after;
    }

    let mut post = PostKey::None;
    if let Some((_, n, after)) = take_phase(rest, &[("post", ()), ("rev", ()), ("r", ())]) {
        post = PostKey::Post(n);
        rest = after;
    }

    let mut dev = DevKey::Release;
    if let Some((_, n, after)) = take_phase(rest, &[("dev", ())]) {
        dev = DevKey::Dev(n);
        rest = after;
    }

    if matches!(pre, PreKey::Final) && matches!(dev, DevKey::Dev(_)) && post == PostKey::None {
        pre = PreKey::BareDev;
    }

    let mut local = String::new();
    if let Some(after) = rest.strip_prefix('+') {
        if after.is_empty()
            || !after
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return None;
        }
        local = after.to_string();
        rest = "";
    }

    if !rest.is_empty() {
        return None;
    }

    Some(Pep440Key {
        epoch,
        release: Release(release),
        pre,
        post,
        dev,
        local,
    })
}

fn take_digits(input: &str) -> Option<(u64, &str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let value = input[..end].parse().ok()?;
    Some((value, &input[end..]))
}

/// Match an optional separator, one of `words`, another optional separator,
/// and an optional number (defaulting to 0).
fn take_phase<'a, T: Copy>(input: &'a str, words: &[(&str, T)]) -> Option<(T, u64, &'a str)> {
    let trimmed = input
        .strip_prefix(['.', '-', '_'])
        .unwrap_or(input);
    for (word, tag) in words {
        if let Some(after) = trimmed.strip_prefix(word) {
            // The keyword must not be followed by more letters (`a` must not
            // swallow the `al` of an arbitrary suffix).
            if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                continue;
            }
            let after = after
                .strip_prefix(['.', '-', '_'])
                .unwrap_or(after);
            let (n, after) = match take_digits(after) {
                Some((n, after)) => (n, after),
                None => (0, after),
            };
            return Some((*tag, n, after));
        }
    }
    None
}
