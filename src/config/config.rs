use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Number of items requested per page. Matches the remote API's maximum page size.
pub const PAGE_SIZE: u32 = 100;

/// Environment variable holding a comma-separated list of access tokens.
pub const TOKENS_ENV_VAR: &str = "FIXTRAIL_TOKENS";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Access tokens used to authenticate API calls, rotated when one runs out of quota
    #[serde(default)]
    pub credentials: Vec<String>,

    /// Maximum number of cross-reference hops followed while resolving a fix commit
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Base URL of the REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request network timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Delay multiplied by the worker index before each unit checkout in swarm mode
    #[serde(default = "default_swarm_stagger", with = "humantime_serde")]
    pub swarm_stagger: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_max_depth() -> usize {
    4
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_swarm_stagger() -> Duration {
    Duration::from_secs(2)
}

fn default_user_agent() -> String {
    "fixtrail".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            max_depth: default_max_depth(),
            api_base_url: default_api_base_url(),
            request_timeout: default_request_timeout(),
            swarm_stagger: default_swarm_stagger(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load configuration from a file (or defaults), then overlay credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the resulting configuration is invalid.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{}'", path.display()))?;
                toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{}'", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(tokens) = std::env::var(TOKENS_ENV_VAR) {
            config.overlay_tokens(&tokens);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).into_app_err("invalid configuration")
    }

    /// Replace the configured credentials with the comma-separated tokens in `tokens`.
    ///
    /// Blank entries are ignored. If `tokens` contains no usable token, the configured
    /// credentials are left untouched.
    pub fn overlay_tokens(&mut self, tokens: &str) {
        let parsed: Vec<String> = tokens
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect();

        if !parsed.is_empty() {
            self.credentials = parsed;
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if no credentials are configured, a credential is blank, or `max_depth` is zero
    pub fn validate(&self) -> Result<()> {
        if self.credentials.is_empty() {
            return Err(app_err!("at least one credential is required (set `credentials` or {TOKENS_ENV_VAR})"));
        }

        if let Some(index) = self.credentials.iter().position(|c| c.trim().is_empty()) {
            return Err(app_err!("credential #{index} is blank"));
        }

        if self.max_depth == 0 {
            return Err(app_err!("max_depth must be at least 1"));
        }

        if self.api_base_url.trim().is_empty() {
            return Err(app_err!("api_base_url must not be empty"));
        }

        Ok(())
    }
}
