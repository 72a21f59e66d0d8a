use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use lambda_http::{Body, Response};
use std::borrow::Cow;
use url::Url;

pub fn valid_base_url(u: &str) -> bool {
    if let Ok(parsed) = Url::parse(u) {
        match parsed.scheme() {
            "http" | "https" => {}
            _ => return false,
        }
        return parsed.host().is_some();
    }
    false
}

pub fn epoch_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// URL-safe base64 without padding: `+` -> `-`, `/` -> `_`, no trailing `=`.
pub fn b64u(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn resp_json(status: u16, v: serde_json::Value) -> Response<Body> {
    let mut resp = Response::new(Body::Text(v.to_string()));
    *resp.status_mut() = lambda_http::http::StatusCode::from_u16(status)
        .unwrap_or(lambda_http::http::StatusCode::INTERNAL_SERVER_ERROR);
    resp.headers_mut().insert(
        "Content-Type",
        lambda_http::http::HeaderValue::from_static("application/json"),
    );
    resp
}

pub fn json_err(
    status: u16,
    code: &'static str,
    message: impl Into<Cow<'static, str>>,
) -> Response<Body> {
    resp_json(
        status,
        serde_json::json!({
            "error": code,
            "message": message.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https() {
        assert!(valid_base_url("https://stream.example.com"));
    }

    #[test]
    fn rejects_javascript_urls() {
        assert!(!valid_base_url("javascript:alert(1)"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!valid_base_url(""));
    }

    #[test]
    fn b64u_is_url_safe() {
        // 0xfb 0xff encodes to "+/8=" in standard base64
        assert_eq!(b64u(&[0xfb, 0xff]), "-_8");
    }

    #[test]
    fn json_err_shape() {
        let resp = json_err(404, "not_found", "Not Found");
        assert_eq!(resp.status().as_u16(), 404);
        let Body::Text(s) = resp.body() else {
            panic!("expected text body");
        };
        let v: serde_json::Value = serde_json::from_str(s).unwrap();
        assert_eq!(v["error"], "not_found");
        assert_eq!(v["message"], "Not Found");
    }
}
