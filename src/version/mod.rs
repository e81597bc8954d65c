//! Version and tag model
//!
//! # Modules
//!
//! - [`number`]: Numeric [`Version`] with zero-padded ordering
//! - [`tag`]: [`Tag`] classification (digest, canonical marker, decoration, precision)
//! - [`ignore`]: Ignore rules and the candidate filter that applies them
//! - [`error`]: Error types for version and range parsing

pub mod error;
pub mod ignore;
pub mod number;
pub mod tag;

pub use ignore::{IgnoreFilter, IgnoreRule, VersionRange};
pub use number::Version;
pub use tag::Tag;
