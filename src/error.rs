use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems. None of these heal without an operator.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to read secret file {path:?}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SignError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid resource name")]
    InvalidResource,

    #[error("expiry of {minutes} minutes is outside 1..={max}")]
    InvalidExpiry { minutes: u32, max: u32 },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing query parameter `{0}`")]
    MissingParam(&'static str),

    #[error("malformed link: {0}")]
    Malformed(String),

    #[error("path is outside the secure prefix")]
    PathOutsidePrefix,

    #[error("signature mismatch")]
    BadSignature,

    #[error("link expired at {expires} (now {now})")]
    Expired { expires: u64, now: u64 },
}

impl SignError {
    /// Short machine code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SignError::Config(_) => "config",
            SignError::InvalidResource => "invalid_resource",
            SignError::InvalidExpiry { .. } => "invalid_expiry",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            SignError::Config(_) => 500,
            SignError::InvalidResource | SignError::InvalidExpiry { .. } => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_variable() {
        let e = ConfigError::Missing("STREAM_SECRET");
        assert_eq!(e.to_string(), "STREAM_SECRET is not set");

        let e = ConfigError::Invalid {
            var: "STREAM_DEFAULT_EXPIRY_MINUTES",
            reason: "not a number".into(),
        };
        assert!(e.to_string().contains("STREAM_DEFAULT_EXPIRY_MINUTES"));
    }

    #[test]
    fn sign_error_maps_to_http_status() {
        assert_eq!(SignError::InvalidResource.status(), 400);
        assert_eq!(
            SignError::InvalidExpiry { minutes: 0, max: 60 }.code(),
            "invalid_expiry"
        );
        assert_eq!(
            SignError::from(ConfigError::Missing("STREAM_BASE_URL")).status(),
            500
        );
    }
}
