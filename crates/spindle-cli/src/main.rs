//! `spindle`: a concurrent source-to-wheel package installer CLI, wrapping
//! the `spindle-pipeline` core.

mod cli;
mod config;
mod logging;
mod printer;
mod progress;
mod registry;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use spindle_index::InMemoryIndex;
use spindle_pipeline::pipeline::wire;
use spindle_pipeline::stub::{StubEnvironment, StubRemoteServer};
use spindle_pipeline::Env;

use cli::{Cli, Command, InstallArgs};
use config::InstallConfig;
use printer::Printer;
use registry::ManifestRegistry;

/// Exit 0 on full success, non-zero when the final report carries any
/// error, 0 on user interrupt with a printed partial report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitStatus {
    Success,
    Failure,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::SUCCESS,
            ExitStatus::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("spindle: error: {err:#}");
            ExitStatus::Failure.into()
        }
    }
}

async fn run(cli: Cli) -> Result<ExitStatus> {
    let Command::Install(args) = cli.command;
    install(args).await
}

async fn install(args: InstallArgs) -> Result<ExitStatus> {
    let config = InstallConfig::from_args(&args)?;
    args.color.apply();
    logging::init(config.log_level, args.quiet);
    let printer = Printer::new(args.quiet);

    if config.roots.is_empty() {
        anyhow::bail!("no requirements given: pass a package spec or -r/--requirements FILE");
    }

    let registry: Arc<ManifestRegistry> = match &config.registry {
        Some(path) => Arc::new(ManifestRegistry::load(path)?),
        None => Arc::new(ManifestRegistry::empty()),
    };

    let env = Env::new(
        Arc::clone(&registry) as Arc<dyn spindle_pipeline::UpstreamIndex>,
        Arc::clone(&registry) as Arc<dyn spindle_pipeline::Transport>,
        Arc::clone(&registry) as Arc<dyn spindle_pipeline::Builder>,
        Arc::clone(&registry) as Arc<dyn spindle_pipeline::MetadataReader>,
        Arc::new(StubEnvironment::new()) as Arc<dyn spindle_pipeline::Environment>,
        Arc::new(StubRemoteServer::new()) as Arc<dyn spindle_pipeline::RemoteServer>,
        Arc::new(InMemoryIndex::new()),
        config.workers,
    );
    let env = Arc::new(env);
    wire(&env);

    let progress_handle = progress::spawn(env.subscribe_progress(), printer);

    let roots = config.roots.clone();
    let upload = config.upload;
    tokio::select! {
        report = env.run(roots, upload) => {
            progress_handle.abort();
            report::render(&report, printer)?;
            if report::has_errors(&report) {
                Ok(ExitStatus::Failure)
            } else {
                Ok(ExitStatus::Success)
            }
        }
        () = wait_for_interrupt() => {
            progress_handle.abort();
            let partial = env.snapshot().await;
            eprintln!(
                "spindle: interrupted — {} built, {} failed, {} repeated so far",
                partial.built,
                partial.failed.len(),
                partial.repeated
            );
            Ok(ExitStatus::Success)
        }
    }
}

/// Waits for Ctrl-C. A user interrupt stops admission and cancels
/// outstanding waits; selecting this branch against `env.run` drops that
/// future, which stops issuing new `feed()` calls while any already-spawned
/// stage worker is left to finish in place.
async fn wait_for_interrupt() {
    let _ = tokio::signal::ctrl_c().await;
}
