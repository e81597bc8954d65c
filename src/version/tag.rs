//! Image tag classification
//!
//! A tag is split into `prefix`, numeric version and `suffix`. The prefix and
//! suffix form the tag's decoration; only tags with the same decoration are
//! ordered against each other, so `1.2-alpine` never competes with `1.3-debian`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

use crate::version::number::Version;

/// Floating release markers, in priority order
pub const CANONICAL_TAGS: &[&str] = &["latest", "current"];

/// Tokens in a tag's decoration that mark it as a prerelease
const PRERELEASE_KEYWORDS: &[&str] = &[
    "alpha",
    "beta",
    "rc",
    "pre",
    "preview",
    "dev",
    "snapshot",
    "nightly",
    "canary",
    "unstable",
    "experimental",
];

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<prefix>[vV]|[A-Za-z][A-Za-z0-9._-]*?[-_])?(?P<version>[0-9]+(?:\.[0-9]+)*)(?P<suffix>[-_+.][A-Za-z0-9._+-]*)?$",
    )
    .expect("tag pattern is valid")
});

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:[+._-][a-z0-9]+)*:[a-fA-F0-9]{32,}|[a-f0-9]{64})$")
        .expect("digest pattern is valid")
});

/// Parsed numeric portion of a tag together with its decoration
#[derive(Debug, Clone)]
struct NumericParts {
    numeric_version: String,
    version: Version,
    prefix: String,
    suffix: String,
    /// Lower-cased prefix and suffix; comparable tags must match exactly
    decoration: String,
}

/// A raw image tag such as `1.2.3-alpine`, `latest` or `sha256:…`
#[derive(Debug, Clone)]
pub struct Tag {
    raw: String,
    is_digest: bool,
    is_canonical: bool,
    numeric: Option<NumericParts>,
}

impl Tag {
    /// Classifies a raw tag. Never fails: tags without a usable numeric
    /// version are simply not comparable.
    pub fn parse(raw: &str) -> Self {
        let is_digest = DIGEST_RE.is_match(raw);
        let is_canonical = CANONICAL_TAGS.iter().any(|c| raw.eq_ignore_ascii_case(c));
        let numeric = if is_digest { None } else { parse_numeric(raw) };

        Self {
            raw: raw.to_string(),
            is_digest,
            is_canonical,
            numeric,
        }
    }

    pub fn name(&self) -> &str {
        &self.raw
    }

    /// Substring of the tag matched as a version, e.g. `1.2` for `v1.2-alpine`
    pub fn numeric_version(&self) -> Option<&str> {
        self.numeric.as_ref().map(|n| n.numeric_version.as_str())
    }

    pub fn version(&self) -> Option<&Version> {
        self.numeric.as_ref().map(|n| &n.version)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.numeric.as_ref().map(|n| n.prefix.as_str())
    }

    pub fn suffix(&self) -> Option<&str> {
        self.numeric.as_ref().map(|n| n.suffix.as_str())
    }

    /// Count of numeric components, zero for non-comparable tags
    pub fn precision(&self) -> usize {
        self.version().map_or(0, Version::precision)
    }

    pub fn is_digest(&self) -> bool {
        self.is_digest
    }

    pub fn is_canonical(&self) -> bool {
        self.is_canonical
    }

    pub fn is_comparable(&self) -> bool {
        self.numeric.is_some()
    }

    /// A plain version tag without any decoration, e.g. `1.9.0`
    pub fn is_bare_version(&self) -> bool {
        self.numeric
            .as_ref()
            .is_some_and(|n| n.prefix.is_empty() && n.suffix.is_empty())
    }

    pub fn comparable_to(&self, other: &Tag) -> bool {
        match (&self.numeric, &other.numeric) {
            (Some(a), Some(b)) => a.decoration == b.decoration,
            _ => false,
        }
    }

    pub fn same_precision(&self, other: &Tag) -> bool {
        self.precision() == other.precision()
    }

    /// True if this tag's numeric components are a strict prefix of `other`'s,
    /// e.g. `1.2` is a less precise form of `1.2.3`.
    pub fn same_but_less_precise(&self, other: &Tag) -> bool {
        match (self.version(), other.version()) {
            (Some(mine), Some(theirs)) => {
                mine.precision() < theirs.precision()
                    && theirs.components().starts_with(mine.components())
            }
            _ => false,
        }
    }

    pub fn looks_like_prerelease(&self) -> bool {
        let Some(numeric) = &self.numeric else {
            return false;
        };

        let decoration = format!("{}{}", numeric.prefix, numeric.suffix).to_ascii_lowercase();
        decoration
            .split(|c: char| !c.is_ascii_alphanumeric())
            .map(|token| token.trim_start_matches(|c: char| c.is_ascii_digit()))
            .map(|token| {
                let letters = token.bytes().take_while(u8::is_ascii_alphabetic).count();
                &token[..letters]
            })
            .any(|word| PRERELEASE_KEYWORDS.contains(&word))
    }
}

fn parse_numeric(raw: &str) -> Option<NumericParts> {
    let captures = TAG_RE.captures(raw)?;
    let numeric_version = captures.name("version")?.as_str();
    let version = Version::parse(numeric_version).ok()?;
    let prefix = captures.name("prefix").map_or("", |m| m.as_str());
    let suffix = captures.name("suffix").map_or("", |m| m.as_str());

    let decoration = format!(
        "{}|{}",
        prefix.to_ascii_lowercase(),
        suffix.to_ascii_lowercase()
    );

    Some(NumericParts {
        numeric_version: numeric_version.to_string(),
        version,
        prefix: prefix.to_string(),
        suffix: suffix.to_string(),
        decoration,
    })
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
