//! Secure streaming links in the nginx `secure_link` format.
//!
//! The proxy recomputes `md5(expires + path + " " + secret)` and compares it to the
//! `md5` query parameter, so every byte of the digest input is part of the contract:
//!
//! ```text
//! <base_url>/secure/<resource>?md5=<url-safe base64, no padding>&expires=<unix secs>
//! ```

use md5::{Digest, Md5};

use crate::config::StreamConfig;
use crate::error::SignError;
use crate::util::{b64u, epoch_now};

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        epoch_now()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    pub base_url: String,
    pub path: String,
    pub expires: u64,
    pub signature: String,
}

impl SignedLink {
    pub fn url(&self) -> String {
        format!(
            "{}{}?md5={}&expires={}",
            self.base_url, self.path, self.signature, self.expires
        )
    }
}

impl std::fmt::Display for SignedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url())
    }
}

pub struct LinkSigner<C: Clock = SystemClock> {
    config: StreamConfig,
    clock: C,
}

impl LinkSigner<SystemClock> {
    pub fn new(config: StreamConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn from_env() -> Result<Self, SignError> {
        Ok(Self::new(StreamConfig::from_env()?))
    }
}

impl<C: Clock> LinkSigner<C> {
    pub fn with_clock(config: StreamConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Signed URL for `resource`, valid for `expiry_minutes` (config default when `None`).
    pub fn sign_link(
        &self,
        resource: &str,
        expiry_minutes: Option<u32>,
    ) -> Result<String, SignError> {
        self.sign(resource, expiry_minutes).map(|link| link.url())
    }

    pub fn sign(
        &self,
        resource: &str,
        expiry_minutes: Option<u32>,
    ) -> Result<SignedLink, SignError> {
        if !valid_resource(resource) {
            return Err(SignError::InvalidResource);
        }
        let minutes = expiry_minutes.unwrap_or(self.config.default_expiry_minutes);
        if minutes == 0 || minutes > self.config.max_expiry_minutes {
            return Err(SignError::InvalidExpiry {
                minutes,
                max: self.config.max_expiry_minutes,
            });
        }

        let expires = self.clock.now() + u64::from(minutes) * 60;
        let path = format!("{}{}", self.config.path_prefix, resource);
        let digest = md5_digest(expires, &path, &self.config.secret);
        let signature = b64u(&digest);

        #[cfg(debug_assertions)]
        tracing::debug!(
            path = %path,
            expires,
            digest_hex = %hex::encode(digest),
            signature = %signature,
            "signed stream link"
        );

        Ok(SignedLink {
            base_url: self.config.base_url.clone(),
            path,
            expires,
            signature,
        })
    }
}

/// The exact string the proxy hashes. Contains the secret; never log it.
pub fn digest_input(expires: u64, path: &str, secret: &str) -> String {
    format!("{expires}{path} {secret}")
}

fn md5_digest(expires: u64, path: &str, secret: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md5::digest(digest_input(expires, path, secret).as_bytes()));
    out
}

pub fn compute_signature(expires: u64, path: &str, secret: &str) -> String {
    b64u(&md5_digest(expires, path, secret))
}

/// Resource names become the path tail verbatim, so they are limited to RFC 3986
/// unreserved characters plus `/`. Anything else would be percent-encoded by the
/// client and hashed differently by the proxy.
pub(crate) fn valid_resource(resource: &str) -> bool {
    if resource.is_empty() || resource.starts_with('/') {
        return false;
    }
    if !resource
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/'))
    {
        return false;
    }
    !resource.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
}
