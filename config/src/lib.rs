//! Configuration for the ribbon client.
//!
//! Configuration lives in `~/.ribbon/config.toml`. Every key is optional; a
//! missing file or section means defaults.
//!
//! ```toml
//! [client]
//! origin = "http://localhost:8080"
//! scheme = "http"
//! method = "GET"
//! push_channel_path = "/ribbon/system/stream"
//! auth_refresh_interval_secs = 30
//!
//! [client.headers]
//! X-Client = "ribbon"
//!
//! [client.reconnect]
//! initial_delay_ms = 500
//! max_delay_ms = 8000
//!
//! [auth]
//! token = "${RIBBON_TOKEN}"
//! ```
//!
//! Header values and `auth.token` support `${VAR}` environment expansion.

use std::path::{Path, PathBuf};
use std::{env, fmt, fs, io};

use ribbon_types::{Headers, HttpMethod};
use serde::Deserialize;
use thiserror::Error;
use toml::de;

pub const DEFAULT_PUSH_CHANNEL_PATH: &str = "/ribbon/system/stream";
pub const DEFAULT_AUTH_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_SCHEME: &str = "http";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct RibbonConfig {
    #[serde(default)]
    pub client: ClientConfig,
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Request client defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL the push channel path is joined to.
    pub origin: String,
    /// Scheme prefixed to `host[:port]` server addresses.
    pub scheme: String,
    /// Default HTTP verb.
    pub method: HttpMethod,
    /// Default headers sent with every request.
    pub headers: Headers,
    /// Minimum token validity requested from the credential provider.
    pub auth_refresh_interval_secs: u64,
    pub push_channel_path: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            method: HttpMethod::Get,
            headers: Headers::new(),
            auth_refresh_interval_secs: DEFAULT_AUTH_REFRESH_INTERVAL_SECS,
            push_channel_path: DEFAULT_PUSH_CHANNEL_PATH.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default headers with `${VAR}` references expanded.
    #[must_use]
    pub fn expanded_headers(&self) -> Headers {
        self.headers
            .iter()
            .map(|(name, value)| (name.to_string(), expand_env_vars(value)))
            .collect()
    }
}

/// Push-channel reconnect backoff.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Down-jitter factor (0.25 = up to 25% shorter).
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_factor: 0.25,
        }
    }
}

#[derive(Deserialize)]
pub struct AuthConfig {
    token: String,
}

// Manual Debug impl to prevent leaking tokens in logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AuthConfig {
    /// The configured token with `${VAR}` references expanded, if non-empty.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let token = expand_env_vars(&self.token);
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}

/// Replace `${VAR}` with the value of `VAR` (empty when unset).
///
/// An unclosed `${` and an empty `${}` are kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            Some(end) => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

impl RibbonConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, de::Error> {
        toml::from_str(content)
    }

    /// Load from the default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Self::from_toml_str(&content).map_err(|source| {
            tracing::warn!(path = %path.display(), %source, "Failed to parse config");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ribbon").join("config.toml"))
}
