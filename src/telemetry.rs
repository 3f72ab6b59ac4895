//! Telemetry logic.
//! Support logging and authentication metrics.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

use crate::handler::Step;

const DEFAULT_DIRECTIVE: &str = "info";

/// Install a global `tracing` subscriber printing to stdout.
///
/// Verbosity follows `RUST_LOG`, `info` when unset. Hosts that already own a
/// subscriber should skip this.
pub fn setup_logging() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
}

/// Count a bind attempt.
pub(crate) fn record_bind(step: Step, success: bool) {
    metrics::counter!(
        "ldap_bind_attempts_total",
        "step" => step.as_str(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Count a finished authentication.
pub(crate) fn record_authentication(success: bool) {
    metrics::counter!(
        "ldap_authentications_total",
        "outcome" => outcome(success)
    )
    .increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}
