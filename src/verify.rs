use constant_time_eq::constant_time_eq;
use url::Url;

use crate::config::StreamConfig;
use crate::error::VerifyError;
use crate::signer::{compute_signature, Clock, SystemClock};

/// A link that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub resource: String,
    pub expires: u64,
}

/// Proxy-side check for links minted by `LinkSigner`.
pub struct LinkVerifier<C: Clock = SystemClock> {
    secret: String,
    path_prefix: String,
    clock: C,
}

impl LinkVerifier<SystemClock> {
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> LinkVerifier<C> {
    pub fn with_clock(config: &StreamConfig, clock: C) -> Self {
        Self {
            secret: config.secret.clone(),
            path_prefix: config.path_prefix.clone(),
            clock,
        }
    }

    pub fn verify_url(&self, url: &str) -> Result<Verified, VerifyError> {
        let parsed = Url::parse(url).map_err(|e| VerifyError::Malformed(e.to_string()))?;
        self.verify_request(parsed.path(), parsed.query().unwrap_or(""))
    }

    /// Check a raw request path plus its query string, as a proxy sees them.
    pub fn verify_request(&self, path: &str, query: &str) -> Result<Verified, VerifyError> {
        let mut md5 = None;
        let mut expires = None;
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            match k.as_ref() {
                "md5" => md5 = Some(v.into_owned()),
                "expires" => expires = Some(v.into_owned()),
                _ => {}
            }
        }
        let md5 = md5.ok_or(VerifyError::MissingParam("md5"))?;
        let expires = expires.ok_or(VerifyError::MissingParam("expires"))?;
        self.verify(path, &md5, &expires)
    }

    pub fn verify(&self, path: &str, md5: &str, expires: &str) -> Result<Verified, VerifyError> {
        let resource = path
            .strip_prefix(self.path_prefix.as_str())
            .filter(|r| !r.is_empty())
            .ok_or(VerifyError::PathOutsidePrefix)?;
        let expires: u64 = expires
            .parse()
            .map_err(|_| VerifyError::Malformed(format!("expires={expires:?}")))?;

        let expected = compute_signature(expires, path, &self.secret);
        if !constant_time_eq(expected.as_bytes(), md5.as_bytes()) {
            tracing::debug!(path, expires, "stream link signature mismatch");
            return Err(VerifyError::BadSignature);
        }

        let now = self.clock.now();
        if now > expires {
            tracing::debug!(path, expires, now, "stream link expired");
            return Err(VerifyError::Expired { expires, now });
        }

        Ok(Verified {
            resource: resource.to_string(),
            expires,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{FixedClock, LinkSigner};

    const NOW: u64 = 1_700_000_000;

    fn config() -> StreamConfig {
        StreamConfig::new("moviesecretkey123", "https://stream.example.com").unwrap()
    }

    fn verifier_at(now: u64) -> LinkVerifier<FixedClock> {
        LinkVerifier::with_clock(&config(), FixedClock(now))
    }

    fn signed(resource: &str, minutes: u32) -> String {
        LinkSigner::with_clock(config(), FixedClock(NOW))
            .sign_link(resource, Some(minutes))
            .unwrap()
    }

    #[test]
    fn accepts_fresh_link() {
        let url = signed("movie1.mp4", 60);
        let ok = verifier_at(NOW + 10).verify_url(&url).unwrap();
        assert_eq!(ok.resource, "movie1.mp4");
        assert_eq!(ok.expires, NOW + 3600);
    }

    #[test]
    fn accepts_pinned_link() {
        let ok = verifier_at(NOW)
            .verify("/secure/movie1.mp4", "vqpKQJv5SrucD6a_nApezQ", "1700003600")
            .unwrap();
        assert_eq!(ok.resource, "movie1.mp4");
    }

    #[test]
    fn accepts_at_expiry_rejects_after() {
        let url = signed("movie1.mp4", 1);
        assert!(verifier_at(NOW + 60).verify_url(&url).is_ok());
        assert_eq!(
            verifier_at(NOW + 61).verify_url(&url),
            Err(VerifyError::Expired {
                expires: NOW + 60,
                now: NOW + 61
            })
        );
    }

    #[test]
    fn round_trips_nested_resources() {
        for name in ["movie1.mp4", "series/s01/e02.m3u8", "trailer-4k.webm"] {
            let url = signed(name, 30);
            assert_eq!(verifier_at(NOW).verify_url(&url).unwrap().resource, name);
        }
    }

    #[test]
    fn every_signable_name_round_trips() {
        let signer = LinkSigner::with_clock(config(), FixedClock(NOW));
        for name in [
            "movie1.mp4",
            "Se7en_~director.cut-v2.mkv",
            "café.mp4",
            "a<b>.mp4",
            "say\"hi\".mp4",
            "x{1}.mp4",
        ] {
            match signer.sign_link(name, None) {
                Ok(url) => assert_eq!(
                    verifier_at(NOW).verify_url(&url).unwrap().resource,
                    name,
                    "{url}"
                ),
                Err(e) => assert!(matches!(e, crate::error::SignError::InvalidResource)),
            }
        }
    }

    #[test]
    fn rejects_tampered_path() {
        let url = signed("movie1.mp4", 60).replace("movie1", "movie2");
        assert_eq!(
            verifier_at(NOW).verify_url(&url),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn rejects_extended_expiry() {
        let url = signed("movie1.mp4", 60).replace("expires=1700003600", "expires=1800000000");
        assert_eq!(
            verifier_at(NOW).verify_url(&url),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn tampered_and_expired_reports_signature() {
        let url = signed("movie1.mp4", 1).replace("movie1", "movie9");
        assert_eq!(
            verifier_at(NOW + 10_000).verify_url(&url),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn rejects_other_secret() {
        let other = StreamConfig::new("not-the-secret", "https://stream.example.com").unwrap();
        let url = signed("movie1.mp4", 60);
        assert_eq!(
            LinkVerifier::with_clock(&other, FixedClock(NOW)).verify_url(&url),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn missing_params() {
        let v = verifier_at(NOW);
        assert_eq!(
            v.verify_request("/secure/movie1.mp4", "expires=1700003600"),
            Err(VerifyError::MissingParam("md5"))
        );
        assert_eq!(
            v.verify_request("/secure/movie1.mp4", "md5=abc"),
            Err(VerifyError::MissingParam("expires"))
        );
    }

    #[test]
    fn malformed_expires() {
        assert!(matches!(
            verifier_at(NOW).verify("/secure/movie1.mp4", "abc", "tomorrow"),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn path_outside_prefix() {
        let v = verifier_at(NOW);
        assert_eq!(
            v.verify("/public/movie1.mp4", "abc", "1700003600"),
            Err(VerifyError::PathOutsidePrefix)
        );
        assert_eq!(
            v.verify("/secure/", "abc", "1700003600"),
            Err(VerifyError::PathOutsidePrefix)
        );
    }

    #[test]
    fn system_clock_accepts_fresh_link() {
        let url = LinkSigner::new(config()).sign_link("movie1.mp4", Some(5)).unwrap();
        assert!(LinkVerifier::new(&config()).verify_url(&url).is_ok());
    }
}
