//! Runs the checks of one host from a host description file.

mod config;
mod host_file;
mod plugins;
mod timeperiods;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hostcheck::plugin::DiscoveryEntry;
use hostcheck::{
    Collaborators, ConsoleSubmitter, Engine, FileBackend, HostKey, MemoryBackend, RunError,
    RunPlugins, SectionView, State, StoreBackend,
};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::host_file::HostFile;
use crate::timeperiods::ScheduleOracle;

#[derive(Parser)]
#[command(name = "hostcheckd")]
#[command(about = "Check execution and result aggregation for monitored hosts")]
#[command(version)]
struct Cli {
    /// Configuration file, created with defaults when missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check all services of a host
    Check {
        /// Host description file (JSON)
        host_file: PathBuf,

        /// Only check these plugins (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        plugins: Vec<String>,

        /// Do not persist counters
        #[arg(long)]
        dry_run: bool,

        /// Raise plugin crashes instead of reporting them
        #[arg(long)]
        debug: bool,
    },

    /// List the services the builtin discovery finds in a host's data
    Discover {
        /// Host description file (JSON)
        host_file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

/// How long shutdown waits for check functions still running
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("UNKNOWN - cannot start runtime: {err}");
            return ExitCode::from(State::Unknown.code());
        }
    };
    run_to_exit(runtime, run(cli))
}

/// Drive `future` to completion, then shut down without waiting for
/// blocking tasks beyond a short grace period
///
/// Check functions stuck past the run timeout keep running on the blocking
/// pool; they must not keep the process alive.
fn run_to_exit<T>(runtime: tokio::runtime::Runtime, future: impl Future<Output = T>) -> T {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    output
}

async fn run(cli: Cli) -> ExitCode {
    let config = match Config::from_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("UNKNOWN - {err}");
            return ExitCode::from(State::Unknown.code());
        }
    };
    logger::init_with(&config.logging);

    let outcome = match cli.command {
        Commands::Check { host_file, plugins, dry_run, debug } => {
            check(config, &host_file, plugins, dry_run, debug).await
        }
        Commands::Discover { host_file } => discover(&host_file).map(|()| State::Ok),
        Commands::Config => {
            print!("{config}");
            Ok(State::Ok)
        }
    };

    match outcome {
        Ok(state) => ExitCode::from(state.code()),
        Err(err) => {
            error!("{err:#}");
            println!("UNKNOWN - {err:#}");
            ExitCode::from(State::Unknown.code())
        }
    }
}

async fn check(
    mut config: Config,
    host_file: &Path,
    only_plugins: Vec<String>,
    dry_run: bool,
    debug: bool,
) -> anyhow::Result<State> {
    let host_file = HostFile::load(host_file)?;
    config.engine.debug |= debug;

    let backend: Arc<dyn StoreBackend> = if dry_run {
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(FileBackend::new(config.engine.state_dir.clone()))
    };
    let collaborators = Collaborators::new(Arc::new(ScheduleOracle::new(config.timeperiods)));
    let engine = Engine::new(config.engine, plugins::registry(), collaborators, backend)
        .read_only(dry_run);

    let run_plugins =
        if only_plugins.is_empty() { RunPlugins::All } else { RunPlugins::only(only_plugins) };
    info!("Checking {} service(s) of {}", host_file.services.len(), host_file.host.name);

    let HostFile { host, services, payloads } = host_file;
    let report = match engine
        .run_host_checks(&host, &services, payloads, &run_plugins, &ConsoleSubmitter)
        .await
    {
        Ok(report) => report,
        Err(RunError::Timeout) => {
            println!("CRIT - Timed out");
            return Ok(State::Crit);
        }
        Err(err) => return Err(err).context("host run failed"),
    };

    println!("{report}");
    Ok(report.state())
}

fn discover(host_file: &Path) -> anyhow::Result<()> {
    let host_file = HostFile::load(host_file)?;
    let sections = host_file.sections();
    let host_key = HostKey::host(&host_file.host.name);

    for (plugin, discovery) in plugins::discoveries() {
        let Some(section_args) = sections.lookup(&host_key, &[plugin.to_string()]) else {
            continue;
        };
        for entry in discovery.discover(&section_args)? {
            match entry {
                DiscoveryEntry::Service(service) => {
                    println!("{plugin} {}", serde_json::to_string(&service)?);
                }
                DiscoveryEntry::Unrecognized(raw) => {
                    warn!("{plugin}: ignoring discovery result {raw}")
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_exit_does_not_wait_for_hung_checks() {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
        let started = Instant::now();

        let code = run_to_exit(runtime, async {
            let hung = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
            let _ = tokio::time::timeout(Duration::from_millis(50), hung).await;
            State::Crit.code()
        });

        assert_eq!(code, State::Crit.code());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
