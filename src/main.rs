mod cli;

use std::io::Read;

use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use serde::Serialize;
use tracing::error;

use cli::{Cli, Command};
use image_tag_resolver::config::{ResolverConfig, log_path};
use image_tag_resolver::dependency::Dependency;
use image_tag_resolver::logging;
use image_tag_resolver::resolver::{CheckError, UpdateReport, check_dependency};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_file = cli.log_file.clone().map(|path| path.unwrap_or_else(log_path));
    let _guard = logging::init(cli.verbose, cli.quiet, cli.log_format, log_file.as_deref())
        .context("failed to initialize logging")?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ResolverConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Check(args) => {
            config.raise_on_ignored |= args.raise_on_ignored;
            let report =
                check_dependency(&config, args.dependency(), &args.ignores, args.credentials())
                    .await
                    .with_context(|| format!("failed to check {}", args.name))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Batch { input } => {
            let dependencies = read_dependencies(&input)?;
            let total = dependencies.len();
            let entries = join_all(dependencies.into_iter().map(|dependency| {
                let name = dependency.name.clone();
                let config = &config;
                async move {
                    BatchEntry::new(name, check_dependency(config, dependency, &[], None).await)
                }
            }))
            .await;

            println!("{}", serde_json::to_string_pretty(&entries)?);

            let failed = entries.iter().filter(|e| e.is_failure()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} dependencies failed", failed, total);
            }
        }
    }

    Ok(())
}

fn read_dependencies(input: &str) -> anyhow::Result<Vec<Dependency>> {
    let content = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?
    };

    serde_json::from_str(&content).context("input must be a JSON array of dependencies")
}

/// One line of `batch` output; a failed dependency does not hide the others
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchEntry {
    Checked(UpdateReport),
    Failed { name: String, error: String },
}

impl BatchEntry {
    fn new(name: String, result: Result<UpdateReport, CheckError>) -> Self {
        match result {
            Ok(report) => BatchEntry::Checked(report),
            Err(e) => {
                error!("Failed to check {}: {}", name, e);
                BatchEntry::Failed {
                    name,
                    error: e.to_string(),
                }
            }
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, BatchEntry::Failed { .. })
    }
}
