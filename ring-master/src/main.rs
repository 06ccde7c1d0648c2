//! Master binary: orchestrator control loop + HTTP ring distribution
//! service (spec.md §2, §6 CLI surface).

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::MasterConfig;
use ring_core::builder::reference::{JsonBuilderLoader, JsonRingValidator};
use ring_core::orchestration::{LoggingNotifier, Orchestrator};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ring-master", about = "Ring orchestrator and distribution service")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the TOML config file.
    #[arg(long, default_value = "/etc/swift/ring-master.toml", global = true)]
    conf: PathBuf,

    /// Override the pidfile path from the config file.
    #[arg(long, global = true)]
    pid: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the service.
    Start {
        /// Run in the foreground instead of spawning a detached process.
        #[arg(short = 'f', long)]
        foreground: bool,
    },
    /// Stop a running instance.
    Stop,
    /// Stop, then start, a running instance.
    Restart {
        #[arg(short = 'f', long)]
        foreground: bool,
    },
    /// Create the pause file: halt orchestration without stopping the process.
    Pause,
    /// Remove the pause file: resume orchestration.
    Unpause,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ring_master=info,ring_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: MasterConfig = match ring_config::load(&cli.conf) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("failed to load {}: {err}", cli.conf.display());
            std::process::exit(1);
        }
    };
    let pid_path = cli.pid.clone().unwrap_or(config.pid_path.clone());

    let exit_code = match cli.command {
        Command::Start { foreground } => cmd_start(config, &cli.conf, &pid_path, foreground),
        Command::Stop => cmd_stop(&pid_path),
        Command::Restart { foreground } => {
            let stop_code = cmd_stop(&pid_path);
            if stop_code != 0 {
                stop_code
            } else {
                cmd_start(config, &cli.conf, &pid_path, foreground)
            }
        }
        Command::Pause => cmd_pause(&config),
        Command::Unpause => cmd_unpause(&config),
    };
    std::process::exit(exit_code);
}

fn cmd_start(config: MasterConfig, conf_path: &PathBuf, pid_path: &PathBuf, foreground: bool) -> i32 {
    if !foreground {
        let exe = match std::env::current_exe() {
            Ok(p) => p,
            Err(err) => {
                error!(error = %err, "could not determine current executable");
                return 1;
            }
        };
        let args = vec![
            "start".to_string(),
            "--foreground".to_string(),
            "--conf".to_string(),
            conf_path.display().to_string(),
            "--pid".to_string(),
            pid_path.display().to_string(),
        ];
        return match ring_config::process::spawn_detached(&exe, &args) {
            Ok(pid) => {
                info!(pid, "started ring-master in background");
                0
            }
            Err(err) => {
                error!(error = %err, "failed to spawn background process");
                1
            }
        };
    }

    if let Err(err) = std::fs::create_dir_all(&config.orchestrator.swiftdir) {
        error!(swiftdir = %config.orchestrator.swiftdir.display(), error = %err, "swiftdir not writable at startup");
        return 1;
    }

    let _pidfile = match ring_config::PidFile::acquire(pid_path) {
        Ok(p) => p,
        Err(err) => {
            error!(error = %err, "failed to acquire pidfile");
            return 1;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return 1;
        }
    };

    runtime.block_on(run_foreground(config))
}

async fn run_foreground(config: MasterConfig) -> i32 {
    let bind = config.bind;
    let swiftdir = config.orchestrator.swiftdir.clone();

    let orchestrator = Arc::new(Orchestrator::new(
        config.orchestrator,
        JsonBuilderLoader,
        Box::new(JsonRingValidator),
        Box::new(LoggingNotifier),
    ));
    let orchestrator_for_thread = orchestrator.clone();
    std::thread::spawn(move || orchestrator_for_thread.run());

    let distribution_state = ring_core::distribution::DistributionState::new(swiftdir);
    let app = ring_core::distribution::router(distribution_state);

    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(l) => l,
        Err(err) => {
            error!(%bind, error = %err, "failed to bind distribution service");
            return 1;
        }
    };
    info!(%bind, "distribution service listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "distribution service exited");
        return 1;
    }
    0
}

fn cmd_stop(pid_path: &PathBuf) -> i32 {
    match ring_config::process::stop(pid_path, Duration::from_secs(30)) {
        Ok(()) => {
            info!("stopped");
            0
        }
        Err(err) => {
            error!(error = %err, "failed to stop");
            1
        }
    }
}

fn cmd_pause(config: &MasterConfig) -> i32 {
    match std::fs::write(&config.orchestrator.pause_file_path, b"") {
        Ok(()) => {
            info!(path = %config.orchestrator.pause_file_path.display(), "paused");
            0
        }
        Err(err) => {
            error!(error = %err, "failed to write pause file");
            1
        }
    }
}

fn cmd_unpause(config: &MasterConfig) -> i32 {
    match std::fs::remove_file(&config.orchestrator.pause_file_path) {
        Ok(()) | Err(_) => {
            info!(path = %config.orchestrator.pause_file_path.display(), "unpaused");
            0
        }
    }
}
