use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use taskboard_store::{DEFAULT_COLLECTION, LocalBackend, RetryPolicy};
use tracing::debug;

const CONFIG_DIR: &str = "taskboard";
const CONFIG_FILE: &str = "config.toml";

/// Overrides `backend.project_id`.
pub const ENV_PROJECT_ID: &str = "TASKBOARD_PROJECT_ID";
/// Overrides `backend.api_key`.
pub const ENV_API_KEY: &str = "TASKBOARD_API_KEY";
/// Overrides `backend.auth_domain`.
pub const ENV_AUTH_DOMAIN: &str = "TASKBOARD_AUTH_DOMAIN";
/// Overrides `backend.storage_bucket`.
pub const ENV_STORAGE_BUCKET: &str = "TASKBOARD_STORAGE_BUCKET";
/// Overrides `backend.messaging_sender_id`.
pub const ENV_MESSAGING_SENDER_ID: &str = "TASKBOARD_MESSAGING_SENDER_ID";
/// Overrides `backend.app_id`.
pub const ENV_APP_ID: &str = "TASKBOARD_APP_ID";
/// Overrides `backend.collection`.
pub const ENV_COLLECTION: &str = "TASKBOARD_COLLECTION";
/// Overrides `backend.data_dir`.
pub const ENV_DATA_DIR: &str = "TASKBOARD_DATA_DIR";

/// Project id used when nothing is configured.
pub const DEMO_PROJECT_ID: &str = "taskboard-demo";
/// Api key used when nothing is configured.
pub const DEMO_API_KEY: &str = "demo-api-key";

/// Application configuration: built-in defaults, then the TOML file, then
/// `TASKBOARD_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Backend project settings.
    pub backend: BackendConfig,
    /// Connection retry settings.
    pub connection: ConnectionConfig,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default file is optional.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed, or when validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut fetch = |key: &'static str| env::var(key).ok();
        Self::load_with_env(path, &mut fetch)
    }

    /// Like [`load`](Self::load) with an injectable environment lookup.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed, or when validation fails.
    pub fn load_with_env(
        path: Option<&Path>,
        fetch: &mut impl FnMut(&'static str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_with(fetch);
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a single file without environment overrides.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed, or when validation fails.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/taskboard/config.toml` or the platform equivalent.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Apply `TASKBOARD_*` overrides. Empty values are ignored.
    pub fn apply_env_with(&mut self, fetch: &mut impl FnMut(&'static str) -> Option<String>) {
        let mut value = |key| fetch(key).filter(|value: &String| !value.trim().is_empty());
        let backend = &mut self.backend;
        if let Some(project_id) = value(ENV_PROJECT_ID) {
            backend.project_id = project_id;
        }
        if let Some(api_key) = value(ENV_API_KEY) {
            backend.api_key = api_key;
        }
        if let Some(collection) = value(ENV_COLLECTION) {
            backend.collection = collection;
        }
        if let Some(data_dir) = value(ENV_DATA_DIR) {
            backend.data_dir = Some(PathBuf::from(data_dir));
        }
        for (key, slot) in [
            (ENV_AUTH_DOMAIN, &mut backend.auth_domain),
            (ENV_STORAGE_BUCKET, &mut backend.storage_bucket),
            (ENV_MESSAGING_SENDER_ID, &mut backend.messaging_sender_id),
            (ENV_APP_ID, &mut backend.app_id),
        ] {
            if let Some(found) = value(key) {
                *slot = Some(found);
            }
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Fails on an empty project id or collection, or zero attempts.
    pub fn validate(&self) -> Result<()> {
        if self.backend.project_id.trim().is_empty() {
            bail!("backend.project_id must not be empty");
        }
        if self.backend.collection.trim().is_empty() {
            bail!("backend.collection must not be empty");
        }
        if self.connection.max_attempts == 0 {
            bail!("connection.max_attempts must be at least 1");
        }
        Ok(())
    }

    /// Retry policy for the connection gatekeeper.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connection.max_attempts,
            delay: Duration::from_millis(self.connection.retry_delay_ms),
        }
    }

    /// Build the document backend described by this configuration.
    #[must_use]
    pub fn backend(&self) -> LocalBackend {
        debug!(
            project_id = %self.backend.project_id,
            collection = %self.backend.collection,
            settings = ?self.backend.client_settings(),
            "configuring backend"
        );
        let api_key = self.backend.api_key.clone();
        match self.backend.data_file() {
            Some(path) => LocalBackend::persistent(api_key, path),
            None => LocalBackend::new(api_key),
        }
    }
}

/// `$XDG_DATA_HOME/taskboard` or the platform equivalent.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(CONFIG_DIR))
}

/// `[backend]` section.
///
/// `auth_domain`, `storage_bucket`, `messaging_sender_id` and `app_id` identify
/// a hosted project. The local backend does not need them; they are accepted so
/// one config file serves both, and are logged when the backend is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Project identifier; also names the data file.
    pub project_id: String,
    /// Api key presented on connect.
    pub api_key: String,
    /// Authentication domain.
    pub auth_domain: Option<String>,
    /// Storage bucket.
    pub storage_bucket: Option<String>,
    /// Messaging sender id.
    pub messaging_sender_id: Option<String>,
    /// Application id.
    pub app_id: Option<String>,
    /// Directory holding persisted data. Data stays in memory when unset.
    pub data_dir: Option<PathBuf>,
    /// Collection holding the tasks.
    pub collection: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            project_id: DEMO_PROJECT_ID.into(),
            api_key: DEMO_API_KEY.into(),
            auth_domain: None,
            storage_bucket: None,
            messaging_sender_id: None,
            app_id: None,
            data_dir: None,
            collection: DEFAULT_COLLECTION.into(),
        }
    }
}

impl BackendConfig {
    /// Hosted-project identifiers that are set, by config key.
    #[must_use]
    pub fn client_settings(&self) -> Vec<(&'static str, &str)> {
        [
            ("auth_domain", &self.auth_domain),
            ("storage_bucket", &self.storage_bucket),
            ("messaging_sender_id", &self.messaging_sender_id),
            ("app_id", &self.app_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|value| (key, value)))
        .collect()
    }

    /// `<data_dir>/<project_id>.json`, when a data dir is configured.
    #[must_use]
    pub fn data_file(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", self.project_id)))
    }
}

/// `[connection]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Attempts per initialization run.
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: 2000,
        }
    }
}
