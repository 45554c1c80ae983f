//! Outpost entry point.
//!
//! By default the process runs as the supervisor, which launches a copy of
//! itself with `--supervisor false` and keeps it alive. The supervised copy
//! constructs the requested daemons over one shared command pipeline and
//! blocks until Ctrl-C.

use clap::{ArgAction, Parser};
use outpost::daemon::Daemon;
use outpost::{Config, PlainSocketDaemon, ProcessContext, RecurringCommands, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "outpost", version, about = "Multi-protocol service host")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Daemons to launch (comma-separated)
    #[arg(short, long, default_value = "plainsocket")]
    daemons: String,

    /// Run as the supervisor that launches and monitors the main program
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    supervisor: bool,

    /// Apply system resource tuning before launching daemons
    #[arg(long, default_value_t = false)]
    tune_system: bool,

    /// Port of the diagnostics profiler endpoint (0 disables)
    #[arg(long, default_value_t = 0)]
    profiler_port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("outpost=info".parse().expect("directive is valid")),
        )
        .init();

    let args = Args::parse();
    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    let daemon_names: Vec<String> = args
        .daemons
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    info!("outpost v{VERSION} starting");

    if args.supervisor {
        let flags: Vec<String> = std::env::args().skip(1).collect();
        let supervisor = Supervisor::new(
            flags,
            daemon_names,
            config.supervisor_notification_recipients.clone(),
            None,
        );
        supervisor.start().await;
        return;
    }

    if args.tune_system {
        info!("system tuning requested, leaving kernel parameters to the platform");
    }
    if args.profiler_port > 0 {
        info!("profiler endpoint is not built into this host");
    }

    if let Err(err) = run_daemons(&config, &daemon_names).await {
        error!("daemon failure: {err}");
        std::process::exit(1);
    }
}

/// Construct and serve the requested daemon set until Ctrl-C.
async fn run_daemons(
    config: &Config,
    daemon_names: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = ProcessContext::new();
    let processor = Arc::new(config.build_processor(ctx.clone(), None)?);

    let mut daemons: Vec<Arc<dyn Daemon>> = Vec::new();
    for name in daemon_names {
        match name.as_str() {
            "plainsocket" => {
                let Some(socket_config) = config.plain_socket_daemon.clone() else {
                    warn!("plainsocket is not present in the configuration, skipping");
                    continue;
                };
                let mut daemon =
                    PlainSocketDaemon::new(ctx.clone(), processor.clone(), socket_config);
                daemon.initialise()?;
                daemons.push(Arc::new(daemon));
            }
            other => warn!("daemon \"{other}\" is not available in this build, skipping"),
        }
    }

    let recurring = match &config.recurring_commands {
        Some(recurring_config) => {
            let engine = Arc::new(RecurringCommands::new(
                processor.clone(),
                recurring_config.clone(),
            )?);
            engine.start();
            Some(engine)
        }
        None => None,
    };

    if daemons.is_empty() && recurring.is_none() {
        return Err("nothing to run: no daemon was constructed".into());
    }

    let mut serving: JoinSet<Result<(), outpost::ServerError>> = JoinSet::new();
    for daemon in &daemons {
        let daemon = daemon.clone();
        info!("starting daemon {}", daemon.name());
        serving.spawn(async move { daemon.start_and_block().await });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
        Some(finished) = serving.join_next() => {
            match finished {
                Ok(Err(err)) => {
                    stop_all(&daemons, recurring.as_ref());
                    return Err(err.into());
                }
                Ok(Ok(())) => info!("a daemon stopped cleanly"),
                Err(err) => {
                    stop_all(&daemons, recurring.as_ref());
                    return Err(err.into());
                }
            }
        }
    }
    stop_all(&daemons, recurring.as_ref());
    Ok(())
}

fn stop_all(daemons: &[Arc<dyn Daemon>], recurring: Option<&Arc<RecurringCommands>>) {
    for daemon in daemons {
        daemon.stop();
    }
    if let Some(engine) = recurring {
        engine.stop();
    }
}
