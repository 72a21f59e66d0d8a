use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::util::valid_base_url;

pub const DEFAULT_PATH_PREFIX: &str = "/secure/";
pub const DEFAULT_EXPIRY_MINUTES: u32 = 60;
pub const DEFAULT_MAX_EXPIRY_MINUTES: u32 = 24 * 60;

/// Everything the signer and the verifier share with the streaming proxy.
#[derive(Clone)]
pub struct StreamConfig {
    pub secret: String,
    /// Streaming server origin, stored without a trailing `/`.
    pub base_url: String,
    pub path_prefix: String,
    pub default_expiry_minutes: u32,
    pub max_expiry_minutes: u32,
}

// Keep the secret out of any `{:?}` that ends up in a log line.
impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("path_prefix", &self.path_prefix)
            .field("default_expiry_minutes", &self.default_expiry_minutes)
            .field("max_expiry_minutes", &self.max_expiry_minutes)
            .finish()
    }
}

impl StreamConfig {
    pub fn new(
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::Missing("STREAM_SECRET"));
        }
        let base_url = normalize_base_url(&base_url.into())?;
        Ok(Self {
            secret,
            base_url,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            default_expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            max_expiry_minutes: DEFAULT_MAX_EXPIRY_MINUTES,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env` but reading through `lookup`, so callers can feed a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let secret = match var("STREAM_SECRET") {
            Some(s) => s,
            None => match var("STREAM_SECRET_FILE") {
                Some(path) => read_secret(PathBuf::from(path))?,
                None => return Err(ConfigError::Missing("STREAM_SECRET")),
            },
        };

        let base_url = var("STREAM_BASE_URL").ok_or(ConfigError::Missing("STREAM_BASE_URL"))?;
        let mut cfg = Self::new(secret, base_url)?;

        if let Some(prefix) = var("STREAM_PATH_PREFIX") {
            cfg.path_prefix = normalize_prefix(&prefix);
        }
        cfg.default_expiry_minutes = try_load(
            &var,
            "STREAM_DEFAULT_EXPIRY_MINUTES",
            DEFAULT_EXPIRY_MINUTES,
        )?;
        cfg.max_expiry_minutes =
            try_load(&var, "STREAM_MAX_EXPIRY_MINUTES", DEFAULT_MAX_EXPIRY_MINUTES)?;

        if cfg.default_expiry_minutes == 0 {
            return Err(ConfigError::Invalid {
                var: "STREAM_DEFAULT_EXPIRY_MINUTES",
                reason: "must be positive".into(),
            });
        }
        if cfg.max_expiry_minutes < cfg.default_expiry_minutes {
            return Err(ConfigError::Invalid {
                var: "STREAM_MAX_EXPIRY_MINUTES",
                reason: format!(
                    "{} is below the default expiry of {}",
                    cfg.max_expiry_minutes, cfg.default_expiry_minutes
                ),
            });
        }

        info!(
            base_url = %cfg.base_url,
            prefix = %cfg.path_prefix,
            default_expiry = cfg.default_expiry_minutes,
            max_expiry = cfg.max_expiry_minutes,
            "stream config loaded"
        );
        Ok(cfg)
    }
}

fn try_load<T, V>(var: V, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                var: key,
                reason: e.to_string(),
            }
        }),
    }
}

fn read_secret(path: PathBuf) -> Result<String, ConfigError> {
    let secret = std::fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| {
            warn!("Failed to read stream secret from {path:?}: {source}");
            ConfigError::SecretFile {
                path: path.clone(),
                source,
            }
        })?;
    if secret.is_empty() {
        return Err(ConfigError::Missing("STREAM_SECRET"));
    }
    Ok(secret)
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Missing("STREAM_BASE_URL"));
    }
    if !valid_base_url(trimmed) {
        return Err(ConfigError::Invalid {
            var: "STREAM_BASE_URL",
            reason: format!("{trimmed:?} is not an http(s) URL"),
        });
    }
    Ok(trimmed.to_string())
}

fn normalize_prefix(raw: &str) -> String {
    let inner = raw.trim().trim_matches('/');
    if inner.is_empty() {
        return "/".to_string();
    }
    format!("/{inner}/")
}
