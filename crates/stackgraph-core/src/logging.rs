//! Log setup
//!
//! The binary installs one process-wide subscriber with [`init`]. Library
//! callers that want a graph's diagnostics elsewhere build a
//! [`tracing::Dispatch`] and hand it to
//! [`StackGraph::with_logger`](crate::graph::StackGraph::with_logger).

use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` if set, else `level`, else `info`
#[must_use]
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the stderr subscriber for this process.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(level: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}

/// Stderr logger for one graph, leaving the global subscriber alone
#[must_use]
pub fn stderr_logger(level: &str) -> Dispatch {
    let subscriber = tracing_subscriber::registry().with(filter(level)).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    );
    Dispatch::new(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_falls_back_instead_of_failing() {
        let _ = filter("not a level[");
    }

    #[test]
    fn stderr_logger_is_usable_as_default() {
        let dispatch = stderr_logger("debug");
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::debug!("inside injected logger");
        });
    }
}
