use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = ".StePPay";
const CONFIG_FILE: &str = "config.json";
const REWARDS_FILE: &str = "rewards.json";
const DEFAULT_SYNC_TIME: &str = "00:05";

pub const MIN_POLLING_SECONDS: u64 = 5;
pub const MAX_POLLING_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorBackend {
    CounterFile,
    Simulated,
}

impl SensorBackend {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "counter-file" | "counter_file" | "file" => Ok(Self::CounterFile),
            "simulated" | "sim" => Ok(Self::Simulated),
            other => bail!("Unknown sensor backend: {other}. Use counter-file or simulated"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CounterFile => "counter-file",
            Self::Simulated => "simulated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub polling_seconds: u64,
    pub daily_goal_steps: u64,
    pub stride_meters: f64,
    pub steps_per_point: u64,
    pub sensor_backend: SensorBackend,
    pub counter_file_path: PathBuf,
    pub step_tracking_enabled: bool,
    pub theme: String,
    pub language: String,
    pub db_path: PathBuf,
    pub rewards_path: PathBuf,
    pub api_port: u16,
    pub retention_days: u32,
    pub notify_on_goal: bool,
    pub daemon_label: String,
    pub sync_enabled: bool,
    pub sync_base_url: String,
    pub sync_api_key: Option<String>,
    pub sync_user_id: Option<String>,
    pub sync_time: String,
    pub sync_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            polling_seconds: 30,
            daily_goal_steps: 10_000,
            stride_meters: 0.762,
            steps_per_point: 50,
            sensor_backend: SensorBackend::Simulated,
            counter_file_path: root.join("sensor").join("steps.txt"),
            step_tracking_enabled: true,
            theme: "light".to_string(),
            language: "en".to_string(),
            db_path: root.join("db").join("steppay.db"),
            rewards_path: root.join(REWARDS_FILE),
            api_port: 7892,
            retention_days: 365,
            notify_on_goal: true,
            daemon_label: "com.steppay.daemon".to_string(),
            sync_enabled: false,
            sync_base_url: String::new(),
            sync_api_key: None,
            sync_user_id: None,
            sync_time: DEFAULT_SYNC_TIME.to_string(),
            sync_timeout_seconds: 10,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        if let Some(parent) = self.counter_file_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create sensor directory: {}", parent.display())
            })?;
        }

        if !self.rewards_path.exists() {
            fs::write(&self.rewards_path, include_str!("../assets/rewards.json")).with_context(
                || {
                    format!(
                        "Failed to create default rewards catalog: {}",
                        self.rewards_path.display()
                    )
                },
            )?;
            set_mode_600(&self.rewards_path)?;
        }

        Ok(())
    }

    pub fn parse_sync_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.sync_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);

        match normalized {
            "polling_seconds" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("polling_seconds must be a number"))?;
                if !(MIN_POLLING_SECONDS..=MAX_POLLING_SECONDS).contains(&parsed) {
                    bail!(
                        "polling_seconds must be between {MIN_POLLING_SECONDS} and {MAX_POLLING_SECONDS}"
                    );
                }
                self.polling_seconds = parsed;
            }
            "daily_goal_steps" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("daily_goal_steps must be a number"))?;
                if parsed == 0 {
                    bail!("daily_goal_steps must be greater than zero");
                }
                self.daily_goal_steps = parsed;
            }
            "stride_meters" => {
                let parsed = value
                    .parse::<f64>()
                    .map_err(|_| anyhow!("stride_meters must be a number"))?;
                if !(0.1..=2.0).contains(&parsed) {
                    bail!("stride_meters must be between 0.1 and 2.0");
                }
                self.stride_meters = parsed;
            }
            "steps_per_point" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("steps_per_point must be a number"))?;
                if parsed == 0 {
                    bail!("steps_per_point must be greater than zero");
                }
                self.steps_per_point = parsed;
            }
            "sensor_backend" => {
                self.sensor_backend = SensorBackend::parse(value)?;
            }
            "counter_file_path" => {
                self.counter_file_path = expand_home(value);
            }
            "step_tracking_enabled" => {
                self.step_tracking_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("step_tracking_enabled must be true/false"))?;
            }
            "theme" => {
                let theme = value.trim().to_lowercase();
                if theme != "light" && theme != "dark" {
                    bail!("theme must be light or dark");
                }
                self.theme = theme;
            }
            "language" => {
                let language = value.trim().to_lowercase();
                if language != "en" && language != "ar" {
                    bail!("language must be en or ar");
                }
                self.language = language;
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "retention_days" => {
                self.retention_days = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("retention_days must be a number"))?;
            }
            "notify_on_goal" => {
                self.notify_on_goal = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("notify_on_goal must be true/false"))?;
            }
            "sync_enabled" => {
                self.sync_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("sync_enabled must be true/false"))?;
            }
            "sync_base_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                Url::parse(trimmed)
                    .with_context(|| format!("sync_base_url is not a valid URL: {trimmed}"))?;
                self.sync_base_url = trimmed.to_string();
            }
            "sync_api_key" => {
                self.sync_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "sync_user_id" => {
                self.sync_user_id = (!value.trim().is_empty()).then_some(value.trim().to_string());
            }
            "sync_time" => {
                parse_hhmm(value)?;
                self.sync_time = value.to_string();
            }
            "sync_timeout_seconds" => {
                self.sync_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("sync_timeout_seconds must be a number"))?
                    .max(5);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: polling_seconds|pedometer.interval_seconds, daily_goal_steps|goal.steps, stride_meters|metrics.stride_meters, steps_per_point|metrics.steps_per_point, sensor_backend|pedometer.backend, counter_file_path|pedometer.counter_file, step_tracking_enabled|pedometer.enabled, theme|appearance.theme, language|appearance.language, api_port|api.port, retention_days|retention.days, notify_on_goal|notify.goal, sync_enabled|sync.enabled, sync_base_url|sync.base_url, sync_api_key|sync.api_key, sync_user_id|sync.user_id, sync_time|sync.time, sync_timeout_seconds|sync.timeout_seconds"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "polling_seconds" => Some(self.polling_seconds.to_string()),
            "daily_goal_steps" => Some(self.daily_goal_steps.to_string()),
            "stride_meters" => Some(self.stride_meters.to_string()),
            "steps_per_point" => Some(self.steps_per_point.to_string()),
            "sensor_backend" => Some(self.sensor_backend.as_str().to_string()),
            "counter_file_path" => Some(self.counter_file_path.display().to_string()),
            "step_tracking_enabled" => Some(self.step_tracking_enabled.to_string()),
            "theme" => Some(self.theme.clone()),
            "language" => Some(self.language.clone()),
            "db_path" => Some(self.db_path.display().to_string()),
            "rewards_path" => Some(self.rewards_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "retention_days" => Some(self.retention_days.to_string()),
            "notify_on_goal" => Some(self.notify_on_goal.to_string()),
            "daemon_label" => Some(self.daemon_label.clone()),
            "sync_enabled" => Some(self.sync_enabled.to_string()),
            "sync_base_url" => Some(self.sync_base_url.clone()),
            "sync_api_key" => Some(
                self.sync_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "sync_user_id" => Some(
                self.sync_user_id
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "sync_time" => Some(self.sync_time.clone()),
            "sync_timeout_seconds" => Some(self.sync_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "polling_seconds" | "pedometer.interval_seconds" => "polling_seconds",
        "daily_goal_steps" | "goal.steps" => "daily_goal_steps",
        "stride_meters" | "metrics.stride_meters" => "stride_meters",
        "steps_per_point" | "metrics.steps_per_point" => "steps_per_point",
        "sensor_backend" | "pedometer.backend" => "sensor_backend",
        "counter_file_path" | "pedometer.counter_file" => "counter_file_path",
        "step_tracking_enabled" | "pedometer.enabled" => "step_tracking_enabled",
        "theme" | "appearance.theme" => "theme",
        "language" | "appearance.language" => "language",
        "api_port" | "api.port" => "api_port",
        "retention_days" | "retention.days" => "retention_days",
        "notify_on_goal" | "notify.goal" => "notify_on_goal",
        "sync_enabled" | "sync.enabled" => "sync_enabled",
        "sync_base_url" | "sync.base_url" => "sync_base_url",
        "sync_api_key" | "sync.api_key" => "sync_api_key",
        "sync_user_id" | "sync.user_id" => "sync_user_id",
        "sync_time" | "sync.time" => "sync_time",
        "sync_timeout_seconds" | "sync.timeout_seconds" => "sync_timeout_seconds",
        "db_path" | "db.path" => "db_path",
        "rewards_path" | "rewards.path" => "rewards_path",
        "daemon_label" | "daemon.label" => "daemon_label",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 00:05 (24-hour format)",))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, SensorBackend};

    #[test]
    fn rejects_zero_steps_per_point() {
        let mut config = Config::default();
        assert!(config.set_value("steps_per_point", "0").is_err());
        assert!(config.set_value("metrics.steps_per_point", "100").is_ok());
        assert_eq!(config.steps_per_point, 100);
    }

    #[test]
    fn rejects_out_of_range_polling_interval() {
        let mut config = Config::default();
        assert!(config.set_value("polling_seconds", "1").is_err());
        assert!(config.set_value("polling_seconds", "60").is_ok());
    }

    #[test]
    fn parses_sensor_backend_aliases() {
        assert_eq!(
            SensorBackend::parse("file").expect("backend"),
            SensorBackend::CounterFile
        );
        assert_eq!(
            SensorBackend::parse("SIMULATED").expect("backend"),
            SensorBackend::Simulated
        );
        assert!(SensorBackend::parse("healthkit").is_err());
    }

    #[test]
    fn rejects_invalid_sync_url() {
        let mut config = Config::default();
        assert!(config.set_value("sync_base_url", "not a url").is_err());
        assert!(
            config
                .set_value("sync.base_url", "https://example.supabase.co/")
                .is_ok()
        );
        assert_eq!(config.sync_base_url, "https://example.supabase.co");
    }
}
