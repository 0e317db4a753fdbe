//! Layered configuration for the edge endpoints.
//!
//! Precedence, later layers override earlier ones:
//! 1. Defaults (hardcoded)
//! 2. TOML file (optional, `--config <path>`)
//! 3. Environment variables
//!
//! Credentials are optional at load time. Each endpoint checks the
//! [`Setting`]s it needs per request so that a missing secret turns into a
//! `server_misconfigured` response instead of a crash at startup.
//!
//! ## Example
//!
//! ```no_run
//! use solace_core::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_file("/etc/solace/edge.toml")
//!     .load()?;
//! # Ok::<(), solace_core::ConfigError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_BILLING_BASE_URL: &str = "https://api.revenuecat.com";
pub const DEFAULT_ENTITLEMENT_ID: &str = "pro";
pub const DEFAULT_STORAGE_BUCKET: &str = "profile-images";
pub const DEFAULT_STORAGE_LIST_LIMIT: u32 = 100;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_PROFILE_IMAGE_FILE: &str = "profile.jpg";

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for ${var}: '{value}' (expected: {expected})")]
    InvalidEnvValue {
        var: String,
        value: String,
        expected: String,
    },
}

/// A credential or endpoint that must be present for a request to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    BackendUrl,
    BackendServiceKey,
    UpstreamApiKey,
    BillingSecretKey,
}

impl Setting {
    /// Environment variable that supplies this setting. Also the name
    /// reported in the `missing` list of a `server_misconfigured` response.
    pub fn env_var(self) -> &'static str {
        match self {
            Setting::BackendUrl => "SUPABASE_URL",
            Setting::BackendServiceKey => "SUPABASE_SERVICE_ROLE_KEY",
            Setting::UpstreamApiKey => "OPENAI_API_KEY",
            Setting::BillingSecretKey => "REVENUECAT_SECRET_KEY",
        }
    }
}

/// Fully merged configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the auth/rows/storage backend.
    pub backend_url: Option<String>,
    /// Administrative (service role) credential for the backend.
    pub backend_service_key: Option<String>,
    /// Credential attached to forwarded completion requests.
    pub upstream_api_key: Option<String>,
    /// Bearer secret for the billing ledger.
    pub billing_secret_key: Option<String>,

    pub upstream_url: String,
    pub billing_base_url: String,
    /// Entitlement that unlocks the completion proxy.
    pub entitlement_id: String,
    pub storage_bucket: String,
    /// Page size for storage listings.
    pub storage_list_limit: u32,
    /// File name of the profile picture inside a user's storage prefix.
    pub profile_image_file: String,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_service_key: None,
            upstream_api_key: None,
            billing_secret_key: None,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            billing_base_url: DEFAULT_BILLING_BASE_URL.to_string(),
            entitlement_id: DEFAULT_ENTITLEMENT_ID.to_string(),
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            storage_list_limit: DEFAULT_STORAGE_LIST_LIMIT,
            profile_image_file: DEFAULT_PROFILE_IMAGE_FILE.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("backend_service_key", &redact(&self.backend_service_key))
            .field("upstream_api_key", &redact(&self.upstream_api_key))
            .field("billing_secret_key", &redact(&self.billing_secret_key))
            .field("upstream_url", &self.upstream_url)
            .field("billing_base_url", &self.billing_base_url)
            .field("entitlement_id", &self.entitlement_id)
            .field("storage_bucket", &self.storage_bucket)
            .field("storage_list_limit", &self.storage_list_limit)
            .field("profile_image_file", &self.profile_image_file)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl Config {
    /// Returns the value of `setting`, treating blank strings as absent.
    pub fn get(&self, setting: Setting) -> Option<&str> {
        let value = match setting {
            Setting::BackendUrl => &self.backend_url,
            Setting::BackendServiceKey => &self.backend_service_key,
            Setting::UpstreamApiKey => &self.upstream_api_key,
            Setting::BillingSecretKey => &self.billing_secret_key,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Env var names of the `required` settings that are absent, in the
    /// order given.
    pub fn missing(&self, required: &[Setting]) -> Vec<String> {
        required
            .iter()
            .filter(|s| self.get(**s).is_none())
            .map(|s| s.env_var().to_string())
            .collect()
    }

    /// Backend base URL without a trailing slash, or empty if unset.
    pub fn backend_base(&self) -> String {
        self.get(Setting::BackendUrl)
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string()
    }
}

/// Builder for layered configuration loading.
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
    skip_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Defaults plus process environment; no file.
    pub fn new() -> Self {
        Self {
            file: None,
            env: None,
            skip_env: false,
        }
    }

    /// Read a TOML file between the defaults and the environment layer.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use `vars` instead of the process environment.
    ///
    /// Useful for tests, which must not mutate process-wide state.
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    /// Skip the environment layer entirely.
    pub fn skip_env_layer(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn load(self) -> Result<Config, ConfigError> {
        let mut config = match &self.file {
            Some(path) => Self::load_file(path)?,
            None => Config::default(),
        };

        if !self.skip_env {
            self.apply_env(&mut config)?;
        }

        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    fn var(&self, key: &str) -> Option<String> {
        match &self.env {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
    }

    fn apply_env(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(v) = self.var(Setting::BackendUrl.env_var()) {
            config.backend_url = Some(v);
        }
        if let Some(v) = self.var(Setting::BackendServiceKey.env_var()) {
            config.backend_service_key = Some(v);
        }
        if let Some(v) = self.var(Setting::UpstreamApiKey.env_var()) {
            config.upstream_api_key = Some(v);
        }
        if let Some(v) = self.var(Setting::BillingSecretKey.env_var()) {
            config.billing_secret_key = Some(v);
        }
        if let Some(v) = self.var("OPENAI_API_URL") {
            config.upstream_url = v;
        }
        if let Some(v) = self.var("REVENUECAT_API_URL") {
            config.billing_base_url = v;
        }
        if let Some(v) = self.var("SOLACE_ENTITLEMENT_ID") {
            config.entitlement_id = v;
        }
        if let Some(v) = self.var("SOLACE_STORAGE_BUCKET") {
            config.storage_bucket = v;
        }
        if let Some(v) = self.var("SOLACE_STORAGE_LIST_LIMIT") {
            config.storage_list_limit = v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidEnvValue {
                    var: "SOLACE_STORAGE_LIST_LIMIT".to_string(),
                    value: v.clone(),
                    expected: "positive integer".to_string(),
                })?;
        }
        if let Some(v) = self.var("SOLACE_PROFILE_IMAGE_FILE") {
            config.profile_image_file = v;
        }
        if let Some(v) = self.var("SOLACE_MAX_BODY_BYTES") {
            config.max_body_bytes = v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidEnvValue {
                    var: "SOLACE_MAX_BODY_BYTES".to_string(),
                    value: v.clone(),
                    expected: "positive integer".to_string(),
                })?;
        }
        Ok(())
    }
}
