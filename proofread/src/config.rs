use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::heuristics::HeuristicConfig;
use crate::monitor::MonitorConfig;
use crate::network::CorrectorConfig;
use crate::network::corrector_client::{DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::pipeline::{DEFAULT_DEBOUNCE_MS, LengthBounds};
use crate::secure_storage::{SecretStore, SystemKeyring, store_verified};
use crate::source::SourceKind;
use crate::source::clipboard::DEFAULT_POLL_INTERVAL_MS;
use crate::store::DEFAULT_REPORT_CAPACITY;

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "proofread";
const HOME_ENV: &str = "PROOFREAD_HOME";
const ENDPOINT_ENV: &str = "PROOFREAD_ENDPOINT";
const API_KEY_ENV: &str = "PROOFREAD_API_KEY";

const MIN_POLL_INTERVAL_MS: u64 = 250;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MIN_DEBOUNCE_MS: u64 = 100;
const MAX_DEBOUNCE_MS: u64 = 10_000;
const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
const MIN_REPORT_CAPACITY: usize = 1;
const MAX_REPORT_CAPACITY: usize = 500;
const MAX_TEXT_CHARS: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot locate a config directory; set {HOME_ENV} or HOME")]
    NoConfigDir,
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub language: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_clipboard_min_chars")]
    pub clipboard_min_chars: usize,
    #[serde(default = "default_clipboard_max_chars")]
    pub clipboard_max_chars: usize,
    #[serde(default = "default_live_min_chars")]
    pub live_min_chars: usize,
    #[serde(default = "default_live_max_chars")]
    pub live_max_chars: usize,
    #[serde(default = "default_report_capacity")]
    pub report_capacity: usize,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            language: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            clipboard_min_chars: default_clipboard_min_chars(),
            clipboard_max_chars: default_clipboard_max_chars(),
            live_min_chars: default_live_min_chars(),
            live_max_chars: default_live_max_chars(),
            report_capacity: default_report_capacity(),
            notifications_enabled: default_notifications_enabled(),
            data_dir: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_clipboard_min_chars() -> usize {
    LengthBounds::CLIPBOARD.min_chars
}

fn default_clipboard_max_chars() -> usize {
    LengthBounds::CLIPBOARD.max_chars
}

fn default_live_min_chars() -> usize {
    LengthBounds::LIVE_INPUT.min_chars
}

fn default_live_max_chars() -> usize {
    LengthBounds::LIVE_INPUT.max_chars
}

fn default_report_capacity() -> usize {
    DEFAULT_REPORT_CAPACITY
}

fn default_notifications_enabled() -> bool {
    true
}

impl Settings {
    pub fn corrector_config(&self) -> CorrectorConfig {
        CorrectorConfig {
            endpoint: self.endpoint.clone(),
            api_key: non_empty(&self.api_key),
            language: non_empty(&self.language),
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn monitor_config(&self, kind: SourceKind) -> MonitorConfig {
        let bounds = match kind {
            SourceKind::LiveInput => LengthBounds {
                min_chars: self.live_min_chars,
                max_chars: self.live_max_chars,
            },
            SourceKind::Clipboard | SourceKind::Manual => LengthBounds {
                min_chars: self.clipboard_min_chars,
                max_chars: self.clipboard_max_chars,
            },
        };

        MonitorConfig {
            bounds,
            debounce: Duration::from_millis(self.debounce_ms),
            notifications: self.notifications_enabled,
            local_checks: kind == SourceKind::LiveInput,
            heuristics: HeuristicConfig::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Where reports and the monitor flag live.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => config_dir(),
        }
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if !redacted.api_key.is_empty() {
            redacted.api_key = "********".to_string();
        }
        redacted
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| non_empty(&value))
}

pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = read_env(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    if let Some(xdg) = read_env("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    read_env("HOME")
        .map(|home| PathBuf::from(home).join(".config").join(APP_DIR_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads settings from disk, then layers in the keyring and environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let mut settings = load_stored_settings()?;
    apply_environment(&mut settings, read_env(ENDPOINT_ENV), read_env(API_KEY_ENV));
    Ok(settings)
}

/// Settings as persisted in the config file and keyring, without environment
/// overrides. Edit these before calling [`save_settings`].
pub fn load_stored_settings() -> Result<Settings, ConfigError> {
    load_stored_at(&config_path()?, &SystemKeyring)
}

/// Validates and persists `settings`, keeping the API key out of the file when
/// the keyring accepts it.
pub fn save_settings(settings: Settings) -> Result<Settings, ConfigError> {
    save_at(&config_path()?, &SystemKeyring, settings)
}

fn load_stored_at(path: &Path, secrets: &dyn SecretStore) -> Result<Settings, ConfigError> {
    let mut settings = normalize_loaded_settings(read_config(path)?);

    match secrets.read_api_key() {
        Ok(Some(api_key)) => {
            settings.api_key = api_key;
        }
        Ok(None) => {
            // Plaintext keys from older config files move into the keyring,
            // but only once the keyring is known to keep them.
            if !settings.api_key.is_empty() && store_verified(secrets, &settings.api_key) {
                let mut sanitized = settings.clone();
                sanitized.api_key.clear();
                if let Err(err) = write_config(path, &sanitized) {
                    warn!("failed to rewrite sanitized config after keyring migration: {err}");
                }
            }
        }
        Err(err) => {
            warn!("failed to read API key from the keyring; using config fallback: {err}");
        }
    }

    Ok(settings)
}

fn save_at(
    path: &Path,
    secrets: &dyn SecretStore,
    settings: Settings,
) -> Result<Settings, ConfigError> {
    let validated = validate_settings(settings)?;

    let mut persisted = validated.clone();
    if store_verified(secrets, &validated.api_key) {
        persisted.api_key.clear();
    }
    write_config(path, &persisted)?;
    debug!(path = %path.display(), "settings saved");

    Ok(validated)
}

/// Sets one field by its JSON name, e.g. `debounceMs` to `1500`. Values that
/// do not parse as JSON are taken as strings.
pub fn set_field(settings: &Settings, key: &str, raw_value: &str) -> Result<Settings, ConfigError> {
    let mut document = serde_json::to_value(settings)?;
    let Some(fields) = document.as_object_mut() else {
        return Err(ConfigError::Invalid("settings are not an object".to_string()));
    };

    let known = fields.contains_key(key) || key == "dataDir";
    if !known {
        return Err(ConfigError::Invalid(format!("unknown setting `{key}`")));
    }

    let value = serde_json::from_str::<serde_json::Value>(raw_value)
        .unwrap_or_else(|_| serde_json::Value::String(raw_value.to_string()));
    fields.insert(key.to_string(), value);

    serde_json::from_value(document)
        .map_err(|err| ConfigError::Invalid(format!("`{key}` has the wrong type: {err}")))
}

fn apply_environment(settings: &mut Settings, endpoint: Option<String>, api_key: Option<String>) {
    if let Some(endpoint) = endpoint {
        settings.endpoint = endpoint;
    }
    if settings.api_key.is_empty() {
        if let Some(api_key) = api_key {
            settings.api_key = api_key;
        }
    }
}

fn read_config(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str::<Settings>(&content)?)
}

fn write_config(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_error = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let serialized = serde_json::to_string_pretty(settings)?;
    fs::write(path, serialized).map_err(io_error)
}

fn normalize_loaded_settings(mut settings: Settings) -> Settings {
    settings.api_key = settings.api_key.trim().to_string();
    settings.language = settings.language.trim().to_lowercase();
    settings.endpoint = settings.endpoint.trim().to_string();
    if settings.endpoint.is_empty() {
        settings.endpoint = default_endpoint();
    }

    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&settings.poll_interval_ms) {
        warn!(
            poll_interval_ms = settings.poll_interval_ms,
            "loaded poll interval is out of range; resetting to default"
        );
        settings.poll_interval_ms = default_poll_interval_ms();
    }

    if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&settings.debounce_ms) {
        warn!(
            debounce_ms = settings.debounce_ms,
            "loaded debounce period is out of range; resetting to default"
        );
        settings.debounce_ms = default_debounce_ms();
    }

    if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&settings.request_timeout_ms) {
        warn!(
            request_timeout_ms = settings.request_timeout_ms,
            "loaded request timeout is out of range; resetting to default"
        );
        settings.request_timeout_ms = default_request_timeout_ms();
    }

    if !bounds_valid(settings.clipboard_min_chars, settings.clipboard_max_chars) {
        warn!(
            min = settings.clipboard_min_chars,
            max = settings.clipboard_max_chars,
            "loaded clipboard length bounds are invalid; resetting to default"
        );
        settings.clipboard_min_chars = default_clipboard_min_chars();
        settings.clipboard_max_chars = default_clipboard_max_chars();
    }

    if !bounds_valid(settings.live_min_chars, settings.live_max_chars) {
        warn!(
            min = settings.live_min_chars,
            max = settings.live_max_chars,
            "loaded live input length bounds are invalid; resetting to default"
        );
        settings.live_min_chars = default_live_min_chars();
        settings.live_max_chars = default_live_max_chars();
    }

    if !(MIN_REPORT_CAPACITY..=MAX_REPORT_CAPACITY).contains(&settings.report_capacity) {
        warn!(
            report_capacity = settings.report_capacity,
            "loaded report capacity is out of range; resetting to default"
        );
        settings.report_capacity = default_report_capacity();
    }

    settings
}

fn bounds_valid(min_chars: usize, max_chars: usize) -> bool {
    min_chars >= 1 && min_chars < max_chars && max_chars <= MAX_TEXT_CHARS
}

fn validate_settings(mut settings: Settings) -> Result<Settings, ConfigError> {
    settings.api_key = settings.api_key.trim().to_string();
    settings.language = settings.language.trim().to_lowercase();
    settings.endpoint = settings.endpoint.trim().to_string();

    if !(settings.endpoint.starts_with("http://") || settings.endpoint.starts_with("https://")) {
        return Err(ConfigError::Invalid(
            "endpoint must be an http:// or https:// URL".to_string(),
        ));
    }

    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&settings.poll_interval_ms) {
        return Err(ConfigError::Invalid(format!(
            "pollIntervalMs must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
        )));
    }

    if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&settings.debounce_ms) {
        return Err(ConfigError::Invalid(format!(
            "debounceMs must be between {MIN_DEBOUNCE_MS} and {MAX_DEBOUNCE_MS}"
        )));
    }

    if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&settings.request_timeout_ms) {
        return Err(ConfigError::Invalid(format!(
            "requestTimeoutMs must be between {MIN_REQUEST_TIMEOUT_MS} and {MAX_REQUEST_TIMEOUT_MS}"
        )));
    }

    if !bounds_valid(settings.clipboard_min_chars, settings.clipboard_max_chars) {
        return Err(ConfigError::Invalid(format!(
            "clipboardMinChars must be at least 1 and below clipboardMaxChars, which must not exceed {MAX_TEXT_CHARS}"
        )));
    }

    if !bounds_valid(settings.live_min_chars, settings.live_max_chars) {
        return Err(ConfigError::Invalid(format!(
            "liveMinChars must be at least 1 and below liveMaxChars, which must not exceed {MAX_TEXT_CHARS}"
        )));
    }

    if !(MIN_REPORT_CAPACITY..=MAX_REPORT_CAPACITY).contains(&settings.report_capacity) {
        return Err(ConfigError::Invalid(format!(
            "reportCapacity must be between {MIN_REPORT_CAPACITY} and {MAX_REPORT_CAPACITY}"
        )));
    }

    Ok(settings)
}
