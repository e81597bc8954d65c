use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use image_tag_resolver::dependency::{Dependency, Requirement, Source};
use image_tag_resolver::logging::LogFormat;
use image_tag_resolver::registry::Credentials;

#[derive(Parser)]
#[command(name = "image-tag-resolver")]
#[command(version, about = "Finds the best update for container image tags and digests")]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/image-tag-resolver/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Write logs to a file instead of stderr. Without a path, logs go to
    /// $XDG_DATA_HOME/image-tag-resolver/image-tag-resolver.log
    #[arg(long, global = true, num_args = 0..=1, value_name = "PATH")]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a single image
    Check(CheckArgs),
    /// Check a JSON array of dependencies
    Batch {
        /// JSON file to read, `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,
    },
}

#[derive(Args)]
pub struct CheckArgs {
    /// Image name (e.g., "nginx", "grafana/grafana")
    pub name: String,

    /// Tag currently in use
    #[arg(long)]
    pub tag: Option<String>,

    /// Digest currently pinned
    #[arg(long)]
    pub digest: Option<String>,

    /// Registry host (defaults to the configured default registry)
    #[arg(long)]
    pub registry: Option<String>,

    /// Version range to ignore, may be repeated
    #[arg(long = "ignore", value_name = "RANGE")]
    pub ignores: Vec<String>,

    /// Fail when ignore conditions leave no update
    #[arg(long)]
    pub raise_on_ignored: bool,

    #[arg(long, requires = "password")]
    pub username: Option<String>,

    #[arg(long, requires = "username")]
    pub password: Option<String>,
}

impl CheckArgs {
    pub fn dependency(&self) -> Dependency {
        Dependency {
            name: self.name.clone(),
            version: self.tag.clone().or_else(|| self.digest.clone()),
            requirements: vec![Requirement {
                source: Source {
                    registry: self.registry.clone(),
                    tag: self.tag.clone(),
                    digest: self.digest.clone(),
                },
            }],
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}
