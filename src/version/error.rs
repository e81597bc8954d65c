use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Not a comparable version: {0:?}")]
    NotComparable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("Empty version range")]
    Empty,

    #[error("Invalid comparator {0:?}")]
    InvalidComparator(String),

    #[error("Invalid version in range: {0}")]
    InvalidVersion(#[from] VersionError),
}
