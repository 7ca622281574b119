use config::{Config, ConfigError, Environment, File, FileFormat};
use log::info;
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "POOL_LEDGER";

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    /// Address of the Redis-protocol server.
    pub url: String,
    /// Namespace prepended to every key.
    pub prefix: String,
    /// Page size hint for cursor scans.
    pub scan_count: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionSettings {
    pub window_secs: u64,
    pub large_window_secs: u64,
    pub sweep_interval_secs: u64,
}

impl RetentionSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn large_window(&self) -> Duration {
        Duration::from_secs(self.large_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewardMode {
    /// Fee split evenly across every participant of the job.
    Solo,
    /// Amount split by contributed difficulty, fee split evenly.
    Equal,
    /// Fee goes to the miner holding the job's minimum share.
    Finder,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewardSettings {
    pub mode: RewardMode,
    /// Minimum unpaid balance, in whole coins, before a miner is paid.
    pub payout_threshold: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub retention: RetentionSettings,
    pub rewards: RewardSettings,
    pub retry: RetrySettings,
}

impl Settings {
    /// Embedded defaults overridden by `POOL_LEDGER__SECTION__KEY` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let default_config = include_str!("default_config.toml");

        info!("Logging environment variables with prefix {}:", ENV_PREFIX);
        log_environment_variables();

        info!("Loading configuration from default_config.toml...");

        let settings = Config::builder()
            .add_source(File::from_str(default_config, FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<Settings>();

        match &settings {
            Ok(s) => info!("Loaded configuration: {:?}", s),
            Err(e) => log::error!("Failed to load configuration: {:?}", e),
        };

        settings
    }

    /// Defaults overridden by an explicit TOML document, no environment.
    pub fn from_toml(overrides: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(
                include_str!("default_config.toml"),
                FileFormat::Toml,
            ))
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()
    }
}

fn log_environment_variables() {
    for (key, value) in std::env::vars() {
        if key.starts_with(ENV_PREFIX) {
            info!("Environment variable: {} = {}", key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.store.prefix, "xdagj");
        assert_eq!(settings.store.url, "redis://127.0.0.1:6379");
        assert_eq!(settings.rewards.mode, RewardMode::Equal);
        assert_eq!(settings.retention.window(), Duration::from_secs(600));
    }

    #[test]
    fn overrides_replace_defaults() {
        let settings = Settings::from_toml(
            r#"
            [store]
            prefix = "test"
            [rewards]
            mode = "finder"
            "#,
        )
        .unwrap();
        assert_eq!(settings.store.prefix, "test");
        assert_eq!(settings.store.scan_count, 100);
        assert_eq!(settings.rewards.mode, RewardMode::Finder);
    }
}
