use std::time::Duration;

use humantime::{format_duration, FormattedDuration};

use crate::Time;

fn human(duration: &Duration) -> FormattedDuration {
    format_duration(*duration)
}

/// A configuration that would produce misaligned or out-of-range data.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} ({}) must be a whole number of milliseconds", human(.value))]
    SubMillisecond { field: &'static str, value: Duration },

    #[error(
        "{field} ({}) must be a multiple of {of} ({})",
        human(.value),
        human(.of_value)
    )]
    NotMultiple {
        field: &'static str,
        value: Duration,
        of: &'static str,
        of_value: Duration,
    },

    #[error("window start (start_time - retention) is before the Unix epoch")]
    BeforeEpoch,

    #[error("{field} is not finite: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("min_value {min} is greater than max_value {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("max_change_value must not be negative: {0}")]
    NegativeChange(f64),

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid generator configuration")]
    Config(#[from] ConfigError),

    #[error("store write of {series} at {time} failed")]
    StoreWrite {
        time: Time,
        series: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("store flush at {time} failed")]
    StoreFlush {
        time: Time,
        #[source]
        source: anyhow::Error,
    },
}
