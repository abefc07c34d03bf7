use anyhow::{Error, bail};
use confique::Config;
use std::{
    fmt,
    net::IpAddr,
    str::FromStr,
    sync::{Arc, OnceLock},
    time::Duration,
};

use self::mqtt::MqttConfig;
use crate::ingestors::mqtt::{Backoff, BackoffStrategy};
use crate::pipeline::CollectorConfig;
pub mod mqtt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorMode {
    /// Separate process, delivers to the storage API over HTTP.
    Standalone,
    /// Inside the service process, writes to storage directly.
    InProcess,
}

impl FromStr for CollectorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "standalone" => Ok(CollectorMode::Standalone),
            "in-process" | "inprocess" | "server" => Ok(CollectorMode::InProcess),
            other => bail!("Unknown collector mode: {}", other),
        }
    }
}

impl fmt::Display for CollectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorMode::Standalone => f.write_str("standalone"),
            CollectorMode::InProcess => f.write_str("in-process"),
        }
    }
}

#[derive(Debug, Config)]
pub struct Pv3Config {
    #[config(env = "PV3_MODE", default = "standalone")]
    pub mode: String,

    #[config(env = "PV3_DEVICE_ID", default = "PV001001DEV")]
    pub device_id: String,

    #[config(env = "PV3_TOPIC_NAMESPACE", default = "pv")]
    pub topic_namespace: String,

    #[config(env = "PV3_TOPIC_PROTOCOL", default = "PV3")]
    pub topic_protocol: String,

    #[config(env = "PV3_API_URL", default = "http://localhost:8800")]
    pub api_url: String,

    #[config(env = "PV3_DELIVERY_TIMEOUT_SECONDS", default = 10)]
    pub delivery_timeout_seconds: u64,

    #[config(env = "PV3_STORAGE_CONNECTION_STRING", default = "sqlite://pv3.db")]
    pub storage_connection_string: String,

    #[config(env = "PV3_FLUSH_INTERVAL_SECONDS", default = 5)]
    pub flush_interval_seconds: u64,

    #[config(env = "PV3_SOC_OUTLIER_THRESHOLD", default = 1.0)]
    pub soc_outlier_threshold: f64,

    /// Consecutive agreeing outliers accepted as a new baseline. Disabled when unset.
    #[config(env = "PV3_SOC_REBASELINE_AFTER")]
    pub soc_rebaseline_after: Option<u32>,

    #[config(env = "PV3_RECONNECT_STRATEGY", default = "constant")]
    pub reconnect_strategy: String,

    #[config(env = "PV3_RECONNECT_DELAY_SECONDS", default = 5)]
    pub reconnect_delay_seconds: u64,

    #[config(env = "PV3_RECONNECT_MAX_DELAY_SECONDS", default = 300)]
    pub reconnect_max_delay_seconds: u64,

    #[config(env = "PV3_PORT", default = 8800)]
    pub port: u16,
    #[config(env = "PV3_ENDPOINT", default = "127.0.0.1")]
    pub endpoint: IpAddr,

    #[config(env = "PV3_HTTP_SERVER_TIMEOUT_SECONDS", default = 30)]
    pub http_server_timeout_seconds: u64,

    #[config(env = "PV3_WS_HEARTBEAT_SECONDS", default = 30)]
    pub ws_heartbeat_seconds: u64,

    #[config(env = "PV3_OBSERVER_BUFFER", default = 64)]
    pub observer_buffer: usize,

    #[config(env = "PV3_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    #[config(nested)]
    pub mqtt: MqttConfig,
}

impl Pv3Config {
    pub fn load() -> Result<Pv3Config, Error> {
        let c = Pv3Config::builder()
            .env()
            .file("settings.toml")
            .load()?;

        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=60).contains(&self.flush_interval_seconds) {
            bail!(
                "Flush interval must be between 1 and 60 seconds, got {}",
                self.flush_interval_seconds
            );
        }
        if !self.soc_outlier_threshold.is_finite() || self.soc_outlier_threshold <= 0.0 {
            bail!(
                "SOC outlier threshold must be a positive number, got {}",
                self.soc_outlier_threshold
            );
        }
        if self.device_id.is_empty() || self.device_id.contains(['/', '+', '#']) {
            bail!("Invalid device id: {:?}", self.device_id);
        }
        if self.reconnect_delay_seconds == 0 {
            bail!("Reconnect delay must be at least one second");
        }
        self.collector_mode()?;
        self.reconnect_strategy()?;
        Ok(())
    }

    pub fn collector_mode(&self) -> Result<CollectorMode, Error> {
        self.mode.parse()
    }

    pub fn reconnect_strategy(&self) -> Result<BackoffStrategy, Error> {
        self.reconnect_strategy.parse()
    }

    pub fn backoff(&self) -> Result<Backoff, Error> {
        Ok(Backoff::new(
            self.reconnect_strategy()?,
            Duration::from_secs(self.reconnect_delay_seconds),
            Duration::from_secs(self.reconnect_max_delay_seconds),
        ))
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            device_id: self.device_id.clone(),
            topic_namespace: self.topic_namespace.clone(),
            topic_protocol: self.topic_protocol.clone(),
            flush_interval: Duration::from_secs(self.flush_interval_seconds),
            soc_outlier_threshold: self.soc_outlier_threshold,
            soc_rebaseline_after: self.soc_rebaseline_after,
            mqtt_host: self.mqtt.address(),
        }
    }
}

static PV3_CONFIG: OnceLock<Arc<Pv3Config>> = OnceLock::new();

pub fn get() -> Result<Arc<Pv3Config>, Error> {
    PV3_CONFIG.get().cloned().ok_or_else(|| {
        Error::msg(
            "Configuration not loaded. Please call load_configuration() before using the configuration",
        )
    })
}

pub fn load_configuration() -> Result<(), Error> {
    // Check if the configuration has already been loaded
    if PV3_CONFIG.get().is_some() {
        return Ok(());
    }

    let config = Pv3Config::load()?;
    PV3_CONFIG.get_or_init(|| Arc::new(config));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_load_config() {
        let config = Pv3Config::load().unwrap();

        assert_eq!(config.port, 8800);
        assert_eq!(config.endpoint, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.collector_mode().unwrap(), CollectorMode::Standalone);
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.soc_rebaseline_after, None);

        temp_env::with_vars(
            [
                ("PV3_PORT", Some("8080")),
                ("PV3_MODE", Some("in-process")),
                ("MQTT_HOST", Some("broker.local")),
                ("PV3_SOC_REBASELINE_AFTER", Some("3")),
            ],
            || {
                let config = Pv3Config::load().unwrap();
                assert_eq!(config.port, 8080);
                assert_eq!(config.collector_mode().unwrap(), CollectorMode::InProcess);
                assert_eq!(config.mqtt.address(), "broker.local:1883");
                assert_eq!(config.soc_rebaseline_after, Some(3));
            },
        );
    }

    #[test]
    #[serial]
    fn test_flush_interval_bounds() {
        for (value, valid) in [("0", false), ("1", true), ("60", true), ("61", false)] {
            temp_env::with_var("PV3_FLUSH_INTERVAL_SECONDS", Some(value), || {
                assert_eq!(Pv3Config::load().is_ok(), valid, "interval {}", value);
            });
        }
    }

    #[test]
    #[serial]
    fn test_invalid_mode_and_strategy() {
        temp_env::with_var("PV3_MODE", Some("cluster"), || {
            assert!(Pv3Config::load().is_err());
        });
        temp_env::with_var("PV3_RECONNECT_STRATEGY", Some("linear"), || {
            assert!(Pv3Config::load().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_invalid_device_id() {
        temp_env::with_var("PV3_DEVICE_ID", Some("dev/+"), || {
            assert!(Pv3Config::load().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_collector_config() {
        temp_env::with_vars(
            [
                ("PV3_DEVICE_ID", Some("PV009")),
                ("PV3_FLUSH_INTERVAL_SECONDS", Some("10")),
                ("PV3_RECONNECT_STRATEGY", Some("exponential")),
            ],
            || {
                let config = Pv3Config::load().unwrap();
                let collector = config.collector_config();
                assert_eq!(collector.device_id, "PV009");
                assert_eq!(collector.flush_interval, Duration::from_secs(10));
                assert_eq!(collector.topic_filter(), "pv/PV3/PV009/#");
                assert_eq!(
                    config.backoff().unwrap().strategy(),
                    BackoffStrategy::ExponentialWithJitter
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_load_configuration() {
        load_configuration().unwrap();
        let config = get().unwrap();
        assert_eq!(config.port, 8800);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("Standalone".parse::<CollectorMode>().unwrap(), CollectorMode::Standalone);
        assert_eq!("in_process".parse::<CollectorMode>().unwrap(), CollectorMode::InProcess);
        assert_eq!(CollectorMode::InProcess.to_string(), "in-process");
    }
}
