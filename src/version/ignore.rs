//! Ignore rules and the candidate filter that applies them

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::version::error::RangeError;
use crate::version::number::Version;
use crate::version::tag::Tag;

/// Caller-supplied predicate over versions. Matching versions are never offered.
pub trait IgnoreRule: Send + Sync + fmt::Debug {
    fn is_satisfied_by(&self, version: &Version) -> bool;
}

/// semver requirements only see the first three components
impl IgnoreRule for semver::VersionReq {
    fn is_satisfied_by(&self, version: &Version) -> bool {
        self.matches(&version.to_semver())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Comparator {
    Exact(Version),
    NotEqual(Version),
    Greater(Version),
    GreaterOrEqual(Version),
    Less(Version),
    LessOrEqual(Version),
    /// `~> 1.2` matches `>= 1.2, < 2`
    Pessimistic(Version),
    /// `1.2.*` matches every version starting with `1.2`
    Wildcard(Vec<u64>),
}

impl Comparator {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Comparator::Exact(v) => version == v,
            Comparator::NotEqual(v) => version != v,
            Comparator::Greater(v) => version > v,
            Comparator::GreaterOrEqual(v) => version >= v,
            Comparator::Less(v) => version < v,
            Comparator::LessOrEqual(v) => version <= v,
            Comparator::Pessimistic(v) => version >= v && *version < pessimistic_upper_bound(v),
            Comparator::Wildcard(prefix) => prefix
                .iter()
                .enumerate()
                .all(|(i, c)| version.components().get(i).copied().unwrap_or(0) == *c),
        }
    }
}

fn pessimistic_upper_bound(version: &Version) -> Version {
    let components = version.components();
    let keep = components.len().saturating_sub(1).max(1);
    let mut upper = components[..keep].to_vec();
    if let Some(last) = upper.last_mut() {
        *last += 1;
    }
    Version::from_components(upper)
}

/// Comma-separated list of comparators that must all hold, e.g. `>= 1.1, < 2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    source: String,
    comparators: Vec<Comparator>,
}

impl VersionRange {
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for VersionRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let comparators = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_comparator)
            .collect::<Result<Vec<_>, _>>()?;

        if comparators.is_empty() {
            return Err(RangeError::Empty);
        }

        Ok(Self {
            source: s.trim().to_string(),
            comparators,
        })
    }
}

impl IgnoreRule for VersionRange {
    fn is_satisfied_by(&self, version: &Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_comparator(text: &str) -> Result<Comparator, RangeError> {
    const OPERATORS: &[&str] = &["~>", ">=", "<=", "!=", ">", "<", "="];

    let (operator, rest) = OPERATORS
        .iter()
        .find_map(|op| text.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("=", text));

    let rest = rest.trim();
    let rest = rest.strip_prefix(['v', 'V']).unwrap_or(rest);

    if rest == "*" || rest == "x" {
        return match operator {
            "=" => Ok(Comparator::Wildcard(Vec::new())),
            _ => Err(RangeError::InvalidComparator(text.to_string())),
        };
    }

    if let Some(prefix) = rest.strip_suffix(".*").or_else(|| rest.strip_suffix(".x")) {
        if operator != "=" {
            return Err(RangeError::InvalidComparator(text.to_string()));
        }
        let version = parse_strict_version(prefix)?;
        return Ok(Comparator::Wildcard(version.components().to_vec()));
    }

    let version = parse_strict_version(rest)?;
    Ok(match operator {
        "~>" => Comparator::Pessimistic(version),
        ">=" => Comparator::GreaterOrEqual(version),
        "<=" => Comparator::LessOrEqual(version),
        "!=" => Comparator::NotEqual(version),
        ">" => Comparator::Greater(version),
        "<" => Comparator::Less(version),
        _ => Comparator::Exact(version),
    })
}

fn parse_strict_version(text: &str) -> Result<Version, RangeError> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(RangeError::InvalidComparator(text.to_string()));
    }
    let version = Version::parse(text)?;
    if version.precision() != text.split('.').count() {
        return Err(RangeError::InvalidComparator(text.to_string()));
    }
    Ok(version)
}

/// Parses ignore conditions as written in config or on the command line
pub fn parse_ignore_rules(conditions: &[String]) -> Result<Vec<Box<dyn IgnoreRule>>, RangeError> {
    conditions
        .iter()
        .map(|c| c.parse::<VersionRange>().map(|r| Box::new(r) as Box<dyn IgnoreRule>))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("every update candidate is ignored")]
pub struct AllVersionsIgnored;

/// Removes candidates matched by ignore rules
#[derive(Debug, Default)]
pub struct IgnoreFilter {
    rules: Vec<Box<dyn IgnoreRule>>,
    raise_on_ignored: bool,
}

impl IgnoreFilter {
    pub fn new(rules: Vec<Box<dyn IgnoreRule>>, raise_on_ignored: bool) -> Self {
        Self {
            rules,
            raise_on_ignored,
        }
    }

    pub fn is_ignored(&self, version: &Version) -> bool {
        self.rules.iter().any(|rule| rule.is_satisfied_by(version))
    }

    /// Drops ignored candidates.
    ///
    /// Fails with [`AllVersionsIgnored`] when raising is enabled, there is no
    /// digest requirement, and the rules removed every candidate newer than
    /// `current`.
    pub fn apply(
        &self,
        candidates: Vec<Tag>,
        current: &Version,
        has_digest_requirement: bool,
    ) -> Result<Vec<Tag>, AllVersionsIgnored> {
        if self.rules.is_empty() {
            return Ok(candidates);
        }

        let newer_before = count_newer(&candidates, current);
        let filtered: Vec<Tag> = candidates
            .into_iter()
            .filter(|tag| !tag.version().is_some_and(|v| self.is_ignored(v)))
            .collect();
        let newer_after = count_newer(&filtered, current);

        debug!(
            "Ignore rules kept {} candidates ({} of {} newer versions)",
            filtered.len(),
            newer_after,
            newer_before
        );

        if self.raise_on_ignored && newer_after == 0 && newer_before > 0 && !has_digest_requirement
        {
            return Err(AllVersionsIgnored);
        }

        Ok(filtered)
    }
}

fn count_newer(tags: &[Tag], current: &Version) -> usize {
    tags.iter()
        .filter(|tag| tag.version().is_some_and(|v| v > current))
        .count()
}
