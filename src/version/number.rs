//! Numeric version extracted from an image tag

use std::cmp::Ordering;
use std::fmt;

use crate::version::error::VersionError;

/// Dot-separated numeric version such as `1.2.3` or `20.04`.
///
/// Missing trailing components compare as zero, so `1.2` and `1.2.0`
/// are equal for both ordering and equality.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Extracts the longest leading run of dot-separated integers from `text`.
    ///
    /// Examples:
    /// - "1.2.3" -> [1, 2, 3]
    /// - "1.2-alpine" -> [1, 2]
    /// - "1..2" -> [1]
    /// - "stable" -> NotComparable
    /// - "1.99999999999999999999" -> NotComparable (component exceeds `u64`)
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let mut components = Vec::new();

        for part in text.split('.') {
            let digits: &str = &part[..part.bytes().take_while(u8::is_ascii_digit).count()];
            if digits.is_empty() {
                break;
            }
            // An overflowing component would leave the run shorter than the
            // text it was read from
            let Ok(value) = digits.parse::<u64>() else {
                return Err(VersionError::NotComparable(text.to_string()));
            };
            components.push(value);
            // A component that continues with non-digits ends the run
            if digits.len() != part.len() {
                break;
            }
        }

        if components.is_empty() {
            return Err(VersionError::NotComparable(text.to_string()));
        }

        Ok(Self { components })
    }

    pub fn from_components(components: Vec<u64>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Number of numeric components
    pub fn precision(&self) -> usize {
        self.components.len()
    }

    /// Projects the version onto `major.minor.patch`, padding with zeros.
    pub fn to_semver(&self) -> semver::Version {
        let component = |i: usize| self.components.get(i).copied().unwrap_or(0);
        semver::Version::new(component(0), component(1), component(2))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}
