//! Signed, time-limited streaming links for the movie storefront.
//!
//! The storefront hands `/secure/...` URLs to the player; the reverse proxy in front of
//! the media files only serves them while `md5` and `expires` check out. See
//! [`signer::LinkSigner`] for the link format and [`verify::LinkVerifier`] for the
//! matching proxy-side check.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod signer;
pub mod util;
pub mod verify;

pub use config::StreamConfig;
pub use error::{ConfigError, SignError, VerifyError};
pub use signer::{Clock, FixedClock, LinkSigner, SignedLink, SystemClock};
pub use verify::{LinkVerifier, Verified};
