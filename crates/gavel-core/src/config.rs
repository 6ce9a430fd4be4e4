//! Pipeline tuning knobs.

use std::time::Duration;

use thiserror::Error;

/// Time a lease must leave for one handler run after a retry pause.
pub const LEASE_HEADROOM: Duration = Duration::from_secs(30);

/// A configuration value could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {key}: {reason}")]
pub struct ConfigError {
    /// The offending variable.
    pub key: &'static str,
    /// What was wrong with it.
    pub reason: String,
}

/// Settings shared by the relay, the bus consumers, the fault router and the
/// reconciler. Passed explicitly into each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How often the relay polls the outbox.
    pub poll_interval: Duration,
    /// Redeliveries after the first failed attempt before faulting.
    pub retry_count: u32,
    /// Pause between redeliveries.
    pub retry_delay: Duration,
    /// Maximum in-flight messages per queue.
    pub queue_concurrency_limit: usize,
    /// Maximum outbox entries relayed per poll.
    pub outbox_batch_size: i64,
    /// Pause between reconciliation attempts while the source is down.
    pub reconcile_backoff: Duration,
    /// A second fault for the same entity within this window escalates.
    pub fault_escalation_window: Duration,
    /// How long a received message stays invisible to other consumers.
    /// Must cover `retry_delay` plus [`LEASE_HEADROOM`].
    pub delivery_lease: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            retry_count: 5,
            retry_delay: Duration::from_secs(5),
            queue_concurrency_limit: 8,
            outbox_batch_size: 100,
            reconcile_backoff: Duration::from_secs(3),
            fault_escalation_window: Duration::from_secs(600),
            delivery_lease: Duration::from_secs(120),
        }
    }
}

impl PipelineConfig {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but unparsable or out of
    /// range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is unparsable or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse(&lookup, key)?.map_or(Ok(default), |s: u64| {
                if s == 0 {
                    Err(ConfigError {
                        key,
                        reason: "must be greater than zero".into(),
                    })
                } else {
                    Ok(Duration::from_secs(s))
                }
            })
        };

        let config = Self {
            poll_interval: secs("GAVEL_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            retry_count: parse(&lookup, "GAVEL_RETRY_COUNT")?.unwrap_or(defaults.retry_count),
            retry_delay: secs("GAVEL_RETRY_DELAY_SECS", defaults.retry_delay)?,
            queue_concurrency_limit: parse(&lookup, "GAVEL_QUEUE_CONCURRENCY")?
                .unwrap_or(defaults.queue_concurrency_limit),
            outbox_batch_size: parse(&lookup, "GAVEL_OUTBOX_BATCH_SIZE")?
                .unwrap_or(defaults.outbox_batch_size),
            reconcile_backoff: secs("GAVEL_RECONCILE_BACKOFF_SECS", defaults.reconcile_backoff)?,
            fault_escalation_window: secs(
                "GAVEL_FAULT_WINDOW_SECS",
                defaults.fault_escalation_window,
            )?,
            delivery_lease: secs("GAVEL_DELIVERY_LEASE_SECS", defaults.delivery_lease)?,
        };

        if config.queue_concurrency_limit == 0 {
            return Err(ConfigError {
                key: "GAVEL_QUEUE_CONCURRENCY",
                reason: "must be at least 1".into(),
            });
        }
        if config.outbox_batch_size <= 0 {
            return Err(ConfigError {
                key: "GAVEL_OUTBOX_BATCH_SIZE",
                reason: "must be at least 1".into(),
            });
        }
        // The consumer renews the lease before each retry pause, so one pause
        // plus one handler run must fit inside it.
        let required_lease = config.retry_delay.saturating_add(LEASE_HEADROOM);
        if config.delivery_lease < required_lease {
            return Err(ConfigError {
                key: "GAVEL_DELIVERY_LEASE_SECS",
                reason: format!(
                    "must be at least {}s (retry delay plus {}s headroom)",
                    required_lease.as_secs(),
                    LEASE_HEADROOM.as_secs()
                ),
            });
        }

        Ok(config)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_yields_design_defaults() {
        let config = PipelineConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.retry_count, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("GAVEL_POLL_INTERVAL_SECS", "2"),
            ("GAVEL_RETRY_COUNT", "0"),
            ("GAVEL_QUEUE_CONCURRENCY", " 16 "),
        ]))
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.retry_count, 0);
        assert_eq!(config.queue_concurrency_limit, 16);
    }

    #[test]
    fn test_unparsable_value_names_the_key() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("GAVEL_RETRY_COUNT", "five")]))
            .unwrap_err();

        assert_eq!(err.key, "GAVEL_RETRY_COUNT");
    }

    #[test]
    fn test_zero_interval_and_zero_concurrency_are_rejected() {
        let interval = PipelineConfig::from_lookup(lookup_from(&[("GAVEL_POLL_INTERVAL_SECS", "0")]))
            .unwrap_err();
        let concurrency =
            PipelineConfig::from_lookup(lookup_from(&[("GAVEL_QUEUE_CONCURRENCY", "0")]))
                .unwrap_err();

        assert_eq!(interval.key, "GAVEL_POLL_INTERVAL_SECS");
        assert_eq!(concurrency.key, "GAVEL_QUEUE_CONCURRENCY");
    }

    #[test]
    fn test_lease_shorter_than_a_retry_pause_is_rejected() {
        // Arrange
        let lookup = lookup_from(&[
            ("GAVEL_RETRY_DELAY_SECS", "30"),
            ("GAVEL_DELIVERY_LEASE_SECS", "45"),
        ]);

        // Act
        let err = PipelineConfig::from_lookup(lookup).unwrap_err();

        // Assert
        assert_eq!(err.key, "GAVEL_DELIVERY_LEASE_SECS");
        assert!(err.reason.contains("60s"));
    }

    #[test]
    fn test_lease_covering_pause_and_headroom_is_accepted() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("GAVEL_RETRY_DELAY_SECS", "30"),
            ("GAVEL_DELIVERY_LEASE_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.delivery_lease, Duration::from_secs(60));
    }
}
