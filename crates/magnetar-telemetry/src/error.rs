//! Errors raised while wiring logging and the job metrics registry.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures from [`crate::init_logging`] and [`crate::Metrics`].
#[derive(Debug)]
pub enum TelemetryError {
    /// Another global subscriber was installed first.
    LoggingInit {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A job metric had an invalid name, help text or label set.
    CollectorBuild {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// A job metric clashed with one already in the registry.
    CollectorRegister {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The `/metrics` exposition could not be encoded.
    ExpositionEncode {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The encoded `/metrics` exposition was not UTF-8.
    ExpositionUtf8 {
        /// Underlying UTF-8 conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingInit { .. } => {
                formatter.write_str("a global log subscriber is already installed")
            }
            Self::CollectorBuild { name, .. } => write!(formatter, "invalid job metric `{name}`"),
            Self::CollectorRegister { name, .. } => {
                write!(formatter, "job metric `{name}` is already registered")
            }
            Self::ExpositionEncode { .. } => {
                formatter.write_str("could not encode the metrics exposition")
            }
            Self::ExpositionUtf8 { .. } => {
                formatter.write_str("metrics exposition is not valid UTF-8")
            }
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoggingInit { source } => Some(source),
            Self::CollectorBuild { source, .. }
            | Self::CollectorRegister { source, .. }
            | Self::ExpositionEncode { source } => Some(source),
            Self::ExpositionUtf8 { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, Registry};

    #[test]
    fn duplicate_job_metric_names_the_collector() -> std::result::Result<(), PrometheusError> {
        let registry = Registry::new();
        registry.register(Box::new(IntCounter::new("polls_total", "polls")?))?;
        let source = registry
            .register(Box::new(IntCounter::new("polls_total", "polls")?))
            .expect_err("duplicate collector");

        let err = TelemetryError::CollectorRegister {
            name: "polls_total",
            source,
        };
        assert_eq!(err.to_string(), "job metric `polls_total` is already registered");
        assert!(err.source().is_some());
        Ok(())
    }

    #[test]
    fn exposition_errors_keep_their_source() {
        let utf8_error = String::from_utf8(vec![0, 159]).expect_err("invalid utf-8");
        let cases = vec![
            (
                TelemetryError::CollectorBuild {
                    name: "events_published_total",
                    source: PrometheusError::Msg("empty help".to_string()),
                },
                "invalid job metric `events_published_total`",
            ),
            (
                TelemetryError::ExpositionEncode {
                    source: PrometheusError::Msg("encode".to_string()),
                },
                "could not encode the metrics exposition",
            ),
            (
                TelemetryError::ExpositionUtf8 { source: utf8_error },
                "metrics exposition is not valid UTF-8",
            ),
        ];

        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
            assert!(err.source().is_some());
        }
    }
}
