use crate::domain::services::DEFAULT_AGENT_CAPACITY;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub agent_capacity: i64,
    pub distribution_interval: Duration,
    pub queue_depth_interval: Duration,
    pub scheduler_enabled: bool,
    pub event_bus_capacity: usize,
    pub client_channel_capacity: usize,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, so tests never touch the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://deskqueue.db?mode=rwc".to_string());

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let server_port = parse_or(&lookup, "SERVER_PORT", 3000u16)?;

        let agent_capacity = parse_or(&lookup, "AGENT_CAPACITY", DEFAULT_AGENT_CAPACITY)?;
        if agent_capacity < 1 {
            return Err(ConfigError::OutOfRange {
                key: "AGENT_CAPACITY",
                value: agent_capacity.to_string(),
            });
        }

        let distribution_interval = parse_secs(&lookup, "DISTRIBUTION_INTERVAL_SECS", 60)?;
        let queue_depth_interval = parse_secs(&lookup, "QUEUE_DEPTH_INTERVAL_SECS", 30)?;

        let scheduler_enabled = match lookup("SCHEDULER_ENABLED") {
            None => true,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SCHEDULER_ENABLED",
                        value: raw,
                    })
                }
            },
        };

        let event_bus_capacity = parse_or(&lookup, "EVENT_BUS_CAPACITY", 1000usize)?;
        let client_channel_capacity = parse_or(&lookup, "CLIENT_CHANNEL_CAPACITY", 100usize)?;
        for (key, value) in [
            ("EVENT_BUS_CAPACITY", event_bus_capacity),
            ("CLIENT_CHANNEL_CAPACITY", client_channel_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::OutOfRange {
                    key,
                    value: value.to_string(),
                });
            }
        }

        let otel_exporter_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT");

        let service_name = lookup("SERVICE_NAME").unwrap_or_else(|| "deskqueue".to_string());

        let metrics_port = parse_or(&lookup, "METRICS_PORT", 9000u16)?;

        Ok(Config {
            database_url,
            server_host,
            server_port,
            agent_capacity,
            distribution_interval,
            queue_depth_interval,
            scheduler_enabled,
            event_bus_capacity,
            client_channel_capacity,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(lookup, key, default)?;
    if secs == 0 {
        return Err(ConfigError::OutOfRange {
            key,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be at least 1, got {value}")]
    OutOfRange { key: &'static str, value: String },
}
