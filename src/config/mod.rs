// src/config/mod.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

pub const ENV_CONFIG_PATH: &str = "APP_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

const ENV_INFLUX_URL: &str = "INFLUX_URL";
const ENV_INFLUX_PASSWORD: &str = "INFLUX_PASSWORD";
const ENV_SCORING_URL: &str = "SCORING_URL";

fn default_influx_url() -> String {
    "http://127.0.0.1:8086".into()
}
fn default_database() -> String {
    "space_shuttle".into()
}
fn default_grouping_interval() -> String {
    "1h".into()
}
fn default_time_limit() -> String {
    "1d".into()
}
fn default_scoring_url() -> String {
    "http://127.0.0.1:9100".into()
}
fn default_topic() -> String {
    "space-shuttle/features".into()
}
fn default_channel_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_url")]
    pub url: String,
    #[serde(default)]
    pub username: String,
    /// "ENV" means: read from INFLUX_PASSWORD
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Bucket width used when a read does not specify one.
    #[serde(default = "default_grouping_interval")]
    pub default_grouping_interval: String,
    /// Look-back window used when a read does not specify one.
    #[serde(default = "default_time_limit")]
    pub default_time_limit: String,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            username: String::new(),
            password: String::new(),
            database: default_database(),
            default_grouping_interval: default_grouping_interval(),
            default_time_limit: default_time_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_scoring_url")]
    pub url: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            url: default_scoring_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit TOML file, then apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        cfg.resolved()
    }

    /// Load using env var + fallbacks:
    /// 1) $APP_CONFIG_PATH
    /// 2) config/app.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(&p);
        }
        AppConfig::default().resolved()
    }

    fn resolved(mut self) -> Result<Self> {
        if let Ok(url) = env::var(ENV_INFLUX_URL) {
            self.influx.url = url;
        }
        if let Ok(url) = env::var(ENV_SCORING_URL) {
            self.scoring.url = url;
        }
        if self.influx.password.trim().eq_ignore_ascii_case("env") {
            self.influx.password = env::var(ENV_INFLUX_PASSWORD)
                .map_err(|_| anyhow!("Missing {ENV_INFLUX_PASSWORD} env var"))?;
        }
        if self.transport.channel_capacity == 0 {
            bail!("transport.channel_capacity must be > 0");
        }
        if self.influx.database.trim().is_empty() {
            bail!("influx.database must not be empty");
        }
        Ok(self)
    }
}
