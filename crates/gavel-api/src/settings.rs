//! Process settings read from the environment.

use std::net::SocketAddr;

use gavel_core::config::PipelineConfig;

use crate::error::AppError;

/// Default base URL of the auction service, as seen by the search service.
pub const DEFAULT_AUCTION_SERVICE_URL: &str = "http://localhost:7001";

/// Everything a service binary needs to start.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Connection string of the service's own database.
    pub database_url: String,
    /// Connection string of the bus database; the service database when
    /// `BUS_DATABASE_URL` is unset.
    pub bus_database_url: String,
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Base URL of the auction service's reconciliation endpoint.
    pub auction_service_url: String,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

impl ServiceSettings {
    /// Reads settings from the process environment. `default_port` is used
    /// when `PORT` is unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or invalid.
    pub fn from_env(default_port: u16) -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok(), default_port)
    }

    /// Reads settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value is
    /// invalid.
    pub fn from_lookup<F>(lookup: F, default_port: u16) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_string())
        })?;
        let bus_database_url = lookup("BUS_DATABASE_URL").unwrap_or_else(|| database_url.clone());

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => default_port,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        let auction_service_url = lookup("AUCTION_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_AUCTION_SERVICE_URL.to_string());

        let pipeline = PipelineConfig::from_lookup(&lookup)?;

        Ok(Self {
            database_url,
            bus_database_url,
            bind_addr,
            auction_service_url,
            pipeline,
        })
    }

    /// Whether the bus shares the service database.
    #[must_use]
    pub fn bus_shares_database(&self) -> bool {
        self.bus_database_url == self.database_url
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_environment_uses_defaults() {
        // Arrange
        let lookup = lookup_from(&[("DATABASE_URL", "postgres://localhost/auctions")]);

        // Act
        let settings = ServiceSettings::from_lookup(lookup, 7001).unwrap();

        // Assert
        assert_eq!(settings.bind_addr, "0.0.0.0:7001".parse().unwrap());
        assert!(settings.bus_shares_database());
        assert_eq!(settings.auction_service_url, DEFAULT_AUCTION_SERVICE_URL);
        assert_eq!(settings.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_overrides_flow_into_pipeline_config() {
        let lookup = lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/search"),
            ("BUS_DATABASE_URL", "postgres://localhost/bus"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("GAVEL_RETRY_DELAY_SECS", "1"),
        ]);

        let settings = ServiceSettings::from_lookup(lookup, 7002).unwrap();

        assert_eq!(settings.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(!settings.bus_shares_database());
        assert_eq!(settings.pipeline.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = ServiceSettings::from_lookup(lookup_from(&[]), 7001);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_pipeline_value_is_a_config_error() {
        let lookup = lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/auctions"),
            ("GAVEL_OUTBOX_BATCH_SIZE", "0"),
        ]);

        let result = ServiceSettings::from_lookup(lookup, 7001);

        match result {
            Err(AppError::Config(message)) => assert!(message.contains("GAVEL_OUTBOX_BATCH_SIZE")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
