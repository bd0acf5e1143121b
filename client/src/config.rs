use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{AsRefStr, EnumString};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

const ENV_BASE_URL: &str = "DEEPGUARD_BASE_URL";
const ENV_ENDPOINT: &str = "DEEPGUARD_ENDPOINT";
const ENV_LOCALE: &str = "DEEPGUARD_LOCALE";
const ENV_TERMS_ACCEPTED: &str = "DEEPGUARD_TERMS_ACCEPTED";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Which backend contract the upload call targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ApiVariant {
    /// `POST /api/inference/upload`, then fetch the result by task id.
    #[default]
    TaskBased,
    /// `POST /api/inference/upload-file` answers with the result inline.
    SingleCall,
}

impl ApiVariant {
    pub fn upload_path(&self) -> &'static str {
        match self {
            ApiVariant::TaskBased => "/api/inference/upload",
            ApiVariant::SingleCall => "/api/inference/upload-file",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Locale {
    #[default]
    En,
    Ko,
}

impl Locale {
    /// Message shown when the service gave no usable detail.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Locale::En => "An error occurred during deepfake detection.",
            Locale::Ko => "딥페이크 탐지 중 오류가 발생했습니다.",
        }
    }
}

/// How long to keep asking for a task result that is not ready yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: u32,
    pub max_backoff_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            multiplier: 2,
            max_backoff_ms: 4_000,
        }
    }
}

impl PollPolicy {
    /// One fetch after submit, no waiting.
    pub fn single_shot() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before fetch number `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(attempt.saturating_sub(1));
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub api: ApiVariant,
    pub poll: PollPolicy,
    pub locale: Locale,
    /// Whether the user has agreed to the terms of use. Injected by the
    /// adapter that owns the consent screen.
    pub terms_accepted: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECS,
            api: ApiVariant::default(),
            poll: PollPolicy::default(),
            locale: Locale::default(),
            terms_accepted: false,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&contents)?;
        log::debug!("Loaded client config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `DEEPGUARD_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(value) = lookup(ENV_ENDPOINT) {
            self.api = parse_value(ENV_ENDPOINT, &value)?;
        }
        if let Some(value) = lookup(ENV_LOCALE) {
            self.locale = parse_value(ENV_LOCALE, &value)?;
        }
        if let Some(value) = lookup(ENV_TERMS_ACCEPTED) {
            self.terms_accepted = parse_flag(ENV_TERMS_ACCEPTED, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs",
                value: self.timeout_secs.to_string(),
            });
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll.max_attempts",
                value: self.poll.max_attempts.to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The timeout in milliseconds for `u32` browser timers, saturating.
    pub fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout().as_millis()).unwrap_or(u32::MAX)
    }

    /// Absolute URL for an API path such as `/api/inference/upload`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
