//! Support for emitting `tracing` events (and, as a fallback, plain `log` records) describing
//! driver activity. Gated behind the `tracing-unstable` feature since the emitted fields and
//! target names may change in minor versions.

pub(crate) mod command;
pub(crate) mod server_selection;

use std::str::FromStr;

pub(crate) const COMMAND_TRACING_EVENT_TARGET: &str = "mongodb::command";
pub(crate) const CONNECTION_TRACING_EVENT_TARGET: &str = "mongodb::connection";
pub(crate) const SDAM_TRACING_EVENT_TARGET: &str = "mongodb::sdam";
pub(crate) const SERVER_SELECTION_TRACING_EVENT_TARGET: &str = "mongodb::server_selection";

pub(crate) const DEFAULT_MAX_DOCUMENT_LENGTH_BYTES: usize = 1000;

/// The logging levels the driver recognizes, ordered from least to most severe. This mirrors the
/// common log/tracing level names rather than `tracing::Level` directly so that the `MONGODB_LOGGING_*`
/// environment variables can be parsed without requiring the `tracing` crate's own level type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub(crate) enum TracingOrLogLevel {
    Trace,
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Critical,
}

impl FromStr for TracingOrLogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warning" | "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

impl TracingOrLogLevel {
    /// The environment variable governing this target's minimum level, per the component name.
    fn env_var_for_target(target: &str) -> Option<&'static str> {
        match target {
            COMMAND_TRACING_EVENT_TARGET => Some("MONGODB_LOGGING_COMMAND"),
            SDAM_TRACING_EVENT_TARGET => Some("MONGODB_LOGGING_SDAM"),
            SERVER_SELECTION_TRACING_EVENT_TARGET => Some("MONGODB_LOGGING_SERVER_SELECTION"),
            CONNECTION_TRACING_EVENT_TARGET => Some("MONGODB_LOGGING_CONNECTION"),
            _ => None,
        }
    }

    /// The minimum level configured for `target` via its environment variable, if any. An
    /// unrecognized value disables the component entirely (returns `None` from the caller's
    /// perspective via [`max_verbosity_level_for_target_enabled`]).
    fn configured_minimum(target: &str) -> Option<Self> {
        let var = Self::env_var_for_target(target)?;
        std::env::var(var).ok()?.parse().ok()
    }
}

/// Returns the configured minimum tracing/log level for `target`, or `None` if the component is
/// unset or was given an unrecognized value (in which case logging for it is disabled).
pub(crate) fn max_verbosity_level_for_target_enabled(
    target: &str,
) -> Option<TracingOrLogLevel> {
    TracingOrLogLevel::configured_minimum(target)
}

/// Evaluates whether a message at `level` destined for `target` should be emitted, consulting the
/// `MONGODB_LOGGING_*` environment variables. Components with no (or an unrecognized) environment
/// variable value are disabled, matching the "Environment variables (observability)" contract.
macro_rules! trace_or_log_enabled {
    (target: $target:expr, $level:expr) => {
        $crate::trace::max_verbosity_level_for_target_enabled($target)
            .is_some_and(|configured| $level >= configured)
    };
}
pub(crate) use trace_or_log_enabled;
