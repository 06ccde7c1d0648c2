//! Minion binary: periodic pull agent (spec.md §4.4, §6 CLI surface).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ring_core::builder::reference::JsonRingValidator;
use ring_core::minion::{Minion, MinionConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ring-minion", about = "Ring pull agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "/etc/swift/ring-minion.toml", global = true)]
    conf: PathBuf,

    #[arg(long, global = true)]
    pid: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Start {
        #[arg(short = 'f', long)]
        foreground: bool,
        /// Run exactly one pass over all ring kinds, then exit.
        #[arg(short = 'o', long)]
        once: bool,
    },
    Stop,
    Restart {
        #[arg(short = 'f', long)]
        foreground: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ring_minion=info,ring_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: MinionConfig = match ring_config::load(&cli.conf) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("failed to load {}: {err}", cli.conf.display());
            std::process::exit(1);
        }
    };
    let pid_path = cli
        .pid
        .clone()
        .unwrap_or_else(|| PathBuf::from("/var/run/ring-minion.pid"));

    let exit_code = match cli.command {
        Command::Start { foreground, once } => cmd_start(config, &cli.conf, &pid_path, foreground, once),
        Command::Stop => cmd_stop(&pid_path),
        Command::Restart { foreground } => {
            let stop_code = cmd_stop(&pid_path);
            if stop_code != 0 {
                stop_code
            } else {
                cmd_start(config, &cli.conf, &pid_path, foreground, false)
            }
        }
    };
    std::process::exit(exit_code);
}

fn cmd_start(
    config: MinionConfig,
    conf_path: &PathBuf,
    pid_path: &PathBuf,
    foreground: bool,
    once: bool,
) -> i32 {
    if !foreground {
        let exe = match std::env::current_exe() {
            Ok(p) => p,
            Err(err) => {
                error!(error = %err, "could not determine current executable");
                return 1;
            }
        };
        let mut args = vec![
            "start".to_string(),
            "--foreground".to_string(),
            "--conf".to_string(),
            conf_path.display().to_string(),
            "--pid".to_string(),
            pid_path.display().to_string(),
        ];
        if once {
            args.push("--once".to_string());
        }
        return match ring_config::process::spawn_detached(&exe, &args) {
            Ok(pid) => {
                info!(pid, "started ring-minion in background");
                0
            }
            Err(err) => {
                error!(error = %err, "failed to spawn background process");
                1
            }
        };
    }

    if let Err(err) = std::fs::create_dir_all(&config.swiftdir) {
        error!(swiftdir = %config.swiftdir.display(), error = %err, "swiftdir not writable at startup");
        return 1;
    }

    // `--once` runs a single pass synchronously and exits without ever
    // taking the pidfile lock or sleeping (spec.md §4.4 supplemental CLI
    // behavior, see SPEC_FULL.md §4.4).
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return 1;
        }
    };

    if once {
        let minion = Minion::new(config, Box::new(JsonRingValidator));
        runtime.block_on(minion.run_once());
        return 0;
    }

    let _pidfile = match ring_config::PidFile::acquire(pid_path) {
        Ok(p) => p,
        Err(err) => {
            error!(error = %err, "failed to acquire pidfile");
            return 1;
        }
    };

    let minion = Minion::new(config, Box::new(JsonRingValidator));
    runtime.block_on(minion.watch());
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
