//! Optional post-publish notification (spec.md §4.2.2 step 9; supplemented
//! from `original_source/srm/ringmasterd.py`'s `EmailNotify` collaborator).
//!
//! Real notification transports (email, pager, webhook) are out of scope;
//! this trait is the seam a deployment plugs one into.

use ring_model::RingKind;

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: RingKind, message: &str);
}

/// Default: no notification side channel configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _kind: RingKind, _message: &str) {}
}

/// Routes notifications through the structured logging pipeline instead of
/// a real transport — useful for deployments that tail logs rather than
/// wiring up email.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, kind: RingKind, message: &str) {
        tracing::info!(%kind, notification = message, "ring change notification");
    }
}
