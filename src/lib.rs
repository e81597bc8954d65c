pub mod config;
pub mod dependency;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod version;
