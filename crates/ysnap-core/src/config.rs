use crate::error::{Error, Result};
use crate::models::{Credentials, DeviceSerial};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://open.ys7.com/";
pub const DEFAULT_INTERVAL_MINUTES: u64 = 1;
/// One week; longer periods are almost certainly a typo.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
pub const DEFAULT_LATEST_FILE: &str = "now.jpg";
pub const DEFAULT_HISTORY_DIR: &str = "img";
pub const ENV_APP_KEY: &str = "YS7_APP_KEY";
pub const ENV_APP_SECRET: &str = "YS7_APP_SECRET";
pub const ENV_DEVICE_SERIAL: &str = "YS7_DEVICE_SERIAL";
pub const ENV_BASE_URL: &str = "YS7_BASE_URL";
pub const ENV_INTERVAL_MINUTES: &str = "YS7_INTERVAL_MINUTES";

/// Runtime configuration resolved from defaults, config file, environment and flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub device_serial: Option<String>,
    pub interval_minutes: u64,
    pub latest_path: PathBuf,
    pub history_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub device_serial: Option<String>,
    pub interval_minutes: Option<u64>,
    pub latest_path: Option<PathBuf>,
    pub history_dir: Option<PathBuf>,
}

/// Values given on the command line; each one wins over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub device_serial: Option<String>,
    pub interval_minutes: Option<u64>,
    pub latest_path: Option<PathBuf>,
    pub history_dir: Option<PathBuf>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ConfigDoctor {
    pub base_url: String,
    pub app_key: Option<String>,
    pub app_secret_redacted: Option<String>,
    pub device_serial: Option<String>,
    pub interval: String,
    pub latest_path: String,
    pub history_dir: String,
    pub config_file: Option<String>,
}

impl Config {
    /// Load configuration with paths defaulting next to the running executable.
    pub fn load() -> Result<Self> {
        let exe_dir = executable_dir()?;
        let file_config = config_path()
            .as_ref()
            .and_then(|path| fs::read_to_string(path).ok())
            .map(|contents| toml::from_str::<ConfigFile>(&contents))
            .transpose()
            .map_err(|err| Error::InvalidConfig(format!("config parse error: {err}")))?;

        Self::resolve(file_config.as_ref(), |key| std::env::var(key).ok(), &exe_dir)
    }

    /// Merge a parsed config file and an environment lookup over the built-in defaults.
    pub fn resolve(
        file_config: Option<&ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
        exe_dir: &Path,
    ) -> Result<Self> {
        let non_empty = |v: &String| !v.trim().is_empty();

        let base_url = env(ENV_BASE_URL)
            .filter(non_empty)
            .or_else(|| file_config.and_then(|c| c.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let app_key = env(ENV_APP_KEY)
            .or_else(|| file_config.and_then(|c| c.app_key.clone()))
            .filter(non_empty);

        let app_secret = env(ENV_APP_SECRET)
            .or_else(|| file_config.and_then(|c| c.app_secret.clone()))
            .filter(non_empty);

        let device_serial = env(ENV_DEVICE_SERIAL)
            .or_else(|| file_config.and_then(|c| c.device_serial.clone()))
            .filter(non_empty);

        let interval_minutes = match env(ENV_INTERVAL_MINUTES).filter(non_empty) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|err| {
                Error::InvalidConfig(format!("{ENV_INTERVAL_MINUTES} must be an integer: {err}"))
            })?,
            None => file_config
                .and_then(|c| c.interval_minutes)
                .unwrap_or(DEFAULT_INTERVAL_MINUTES),
        };

        let latest_path = file_config
            .and_then(|c| c.latest_path.clone())
            .unwrap_or_else(|| exe_dir.join(DEFAULT_LATEST_FILE));
        let history_dir = file_config
            .and_then(|c| c.history_dir.clone())
            .unwrap_or_else(|| exe_dir.join(DEFAULT_HISTORY_DIR));

        Ok(Self {
            base_url,
            app_key,
            app_secret,
            device_serial,
            interval_minutes,
            latest_path,
            history_dir,
        })
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.base_url {
            self.base_url = v;
        }
        if let Some(v) = overrides.app_key {
            self.app_key = Some(v);
        }
        if let Some(v) = overrides.app_secret {
            self.app_secret = Some(v);
        }
        if let Some(v) = overrides.device_serial {
            self.device_serial = Some(v);
        }
        if let Some(v) = overrides.interval_minutes {
            self.interval_minutes = v;
        }
        if let Some(v) = overrides.latest_path {
            self.latest_path = v;
        }
        if let Some(v) = overrides.history_dir {
            self.history_dir = v;
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let app_key = self
            .app_key
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig(format!("appKey is required (or {ENV_APP_KEY})")))?;
        let app_secret = self
            .app_secret
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("appSecret is required (or {ENV_APP_SECRET})"))
            })?;
        Ok(Credentials::new(app_key, app_secret))
    }

    pub fn device(&self) -> Result<DeviceSerial> {
        let Some(raw) = self.device_serial.as_deref() else {
            return Err(Error::InvalidConfig(format!(
                "sn is required (or {ENV_DEVICE_SERIAL})"
            )));
        };
        raw.parse::<DeviceSerial>().map_err(Error::InvalidConfig)
    }

    pub fn interval(&self) -> Result<Duration> {
        if self.interval_minutes == 0 {
            return Err(Error::InvalidConfig(
                "interval must be at least one minute".into(),
            ));
        }
        if self.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(Error::InvalidConfig(format!(
                "interval must be at most {MAX_INTERVAL_MINUTES} minutes, got {}",
                self.interval_minutes
            )));
        }
        let secs = self
            .interval_minutes
            .checked_mul(60)
            .ok_or_else(|| Error::InvalidConfig("interval is out of range".into()))?;
        Ok(Duration::from_secs(secs))
    }

    pub fn doctor(&self) -> ConfigDoctor {
        ConfigDoctor {
            base_url: self.base_url.clone(),
            app_key: self.app_key.clone(),
            app_secret_redacted: self.app_secret.as_ref().map(|v| redact(v)),
            device_serial: self.device_serial.clone(),
            interval: humantime::format_duration(Duration::from_secs(
                self.interval_minutes.saturating_mul(60),
            ))
            .to_string(),
            latest_path: self.latest_path.display().to_string(),
            history_dir: self.history_dir.display().to_string(),
            config_file: config_path().map(|p| p.display().to_string()),
        }
    }
}

/// Directory that holds the running executable; default outputs live beside it.
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|err| {
        Error::InvalidConfig(format!("unable to determine executable path: {err}"))
    })?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        Error::InvalidConfig(format!(
            "executable path has no parent directory: {}",
            exe.display()
        ))
    })
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("ysnap").join("config.toml"))
}

fn redact(key: &str) -> String {
    // Last four characters, not bytes; secrets may be non-ASCII.
    match key.char_indices().rev().nth(3) {
        Some((start, _)) if start > 0 => format!("****{}", &key[start..]),
        _ => "****".to_string(),
    }
}
