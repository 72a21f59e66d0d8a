use lambda_http::{Body, Error, Request, Response};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::{require_auth, Caller},
    config::StreamConfig,
    error::SignError,
    model::{SignReq, SignResp},
    signer::{Clock, LinkSigner, SystemClock},
    util::{json_err, resp_json},
};

const STREAM_PREFIX: &str = "/v1/stream/";

#[derive(Clone)]
pub struct Ctx {
    pub signer: Arc<LinkSigner<Box<dyn Clock>>>,
}

impl Ctx {
    pub fn new() -> Result<Self, SignError> {
        let config = StreamConfig::from_env()?;
        Ok(Self::with_clock(config, SystemClock))
    }

    pub fn with_clock(config: StreamConfig, clock: impl Clock + 'static) -> Self {
        let clock: Box<dyn Clock> = Box::new(clock);
        Self {
            signer: Arc::new(LinkSigner::with_clock(config, clock)),
        }
    }
}

pub async fn router(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    let method = req.method().as_str();
    let path = req.uri().path();

    match (method, path) {
        ("POST", "/v1/stream/links") => create_link(req, ctx).await,
        ("GET", p) if p.starts_with(STREAM_PREFIX) => redirect_link(req, ctx).await,
        _ => Ok(json_err(404, "not_found", "Not Found")),
    }
}

/// Non-admins may shorten a link but never stretch it past the default.
fn effective_minutes(ctx: &Ctx, caller: &Caller, requested: Option<u32>) -> u32 {
    let default = ctx.signer.config().default_expiry_minutes;
    match requested {
        None => default,
        Some(m) if caller.is_admin => m,
        Some(m) => m.min(default),
    }
}

fn sign_err(e: SignError) -> Response<Body> {
    match &e {
        SignError::Config(_) => {
            tracing::error!("stream signer misconfigured: {e}");
            json_err(e.status(), e.code(), "Streaming is not configured")
        }
        _ => json_err(e.status(), e.code(), e.to_string()),
    }
}

fn body_bytes(req: &Request) -> Vec<u8> {
    match req.body() {
        Body::Text(s) => s.as_bytes().to_vec(),
        Body::Binary(b) => b.clone(),
        _ => Vec::new(),
    }
}

async fn create_link(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    let caller = match require_auth(&req) {
        Ok(c) => c,
        Err(_) => {
            return Ok(json_err(401, "unauthorized", "Requires authentication"));
        }
    };

    let payload: SignReq = match serde_json::from_slice(&body_bytes(&req)) {
        Ok(p) => p,
        Err(e) => return Ok(json_err(400, "bad_json", e.to_string())),
    };

    let minutes = effective_minutes(ctx, &caller, payload.expiry_minutes);
    let link = match ctx.signer.sign(&payload.resource, Some(minutes)) {
        Ok(l) => l,
        Err(e) => return Ok(sign_err(e)),
    };

    tracing::info!(
        user = %caller.user_id,
        path = %link.path,
        expires = link.expires,
        "issued stream link"
    );

    let out = SignResp {
        url: link.url(),
        path: link.path,
        expires: link.expires,
        expiry_minutes: minutes,
    };
    Ok(resp_json(201, json!(out)))
}

async fn redirect_link(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    let caller = match require_auth(&req) {
        Ok(c) => c,
        Err(_) => {
            return Ok(json_err(401, "unauthorized", "Requires authentication"));
        }
    };

    let Some(raw) = req.uri().path().strip_prefix(STREAM_PREFIX) else {
        return Ok(json_err(404, "not_found", "Not Found"));
    };
    let resource = match urlencoding::decode(raw) {
        Ok(r) => r.into_owned(),
        Err(_) => return Ok(json_err(400, "invalid_resource", "invalid resource name")),
    };

    let qp = req.uri().query().unwrap_or("");
    let requested = match url::form_urlencoded::parse(qp.as_bytes())
        .find(|(k, _)| k == "expiry_minutes")
        .map(|(_, v)| v.parse::<u32>())
    {
        None => None,
        Some(Ok(m)) => Some(m),
        Some(Err(_)) => {
            return Ok(json_err(400, "invalid_expiry", "expiry_minutes must be a number"))
        }
    };

    let minutes = effective_minutes(ctx, &caller, requested);
    let link = match ctx.signer.sign(&resource, Some(minutes)) {
        Ok(l) => l,
        Err(e) => return Ok(sign_err(e)),
    };

    tracing::info!(user = %caller.user_id, path = %link.path, "redirecting to stream link");

    let resp = Response::builder()
        .status(302)
        .header("Location", link.url())
        .header("Cache-Control", "no-store, no-cache, must-revalidate")
        .header("Pragma", "no-cache")
        .body(Body::Empty)
        .map_err(|e| Error::from(format!("resp: {e}")))?;
    Ok(resp)
}
