//! The Orchestrator component (spec.md §4.2): config, the pause sentinel,
//! optional notifications, the per-ring-kind state machine, and the outer
//! endless loop that drives it.

mod config;
mod cycle;
mod notify;
mod pause;
mod runtime;

pub use config::OrchestratorConfig;
pub use cycle::{run_cycle, CycleOutcome, DispersionGate, Gate, SubprocessDispersionGate};
pub use notify::{LoggingNotifier, Notifier, NoopNotifier};
pub use pause::PauseGate;
pub use runtime::Orchestrator;
