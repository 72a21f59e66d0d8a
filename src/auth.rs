use lambda_http::request::RequestContext;
use lambda_http::Request;
use lambda_http::RequestExt;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

pub const ADMIN_ROLE: &str = "Admin";

/// Where the caller identity came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub enum CallerSource {
    /// Simple-response Lambda authorizer context
    Authorizer,
    /// JWT authorizer claims (storefront identity tokens)
    Jwt,
}

/// Normalized caller identity returned by `caller_id()`.
#[derive(Debug, Clone, Serialize)]
pub struct Caller {
    pub user_id: String,
    pub source: CallerSource,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub is_admin: bool,
}

#[derive(Debug, PartialEq)]
pub struct Unauthorized;

impl std::fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Unauthorized")
    }
}

impl std::error::Error for Unauthorized {}

fn has_admin(roles: &[String]) -> bool {
    roles.iter().any(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
}

/// Roles arrive as "Admin,User" from the authorizer and as "[Admin User]" from
/// API Gateway's rendering of JWT array claims.
fn parse_roles(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().trim_matches('"'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_str<'a>(fields: &'a HashMap<String, JsonValue>, key: &str) -> Option<&'a str> {
    fields.get(key)?.as_str()
}

fn authorizer_caller(req: &Request) -> Option<Caller> {
    let ctx = match req.request_context_ref()? {
        RequestContext::ApiGatewayV2(c) => c,
        _ => return None,
    };
    let authz = ctx.authorizer.as_ref()?;
    if authz.fields.is_empty() {
        return None;
    }

    // Simple responses nest the context under "lambda"; older payloads are flat.
    let nested: Option<HashMap<String, JsonValue>> = authz
        .fields
        .get("lambda")
        .and_then(|v| v.as_object())
        .map(|m| m.clone().into_iter().collect());
    let fields = nested.as_ref().unwrap_or(&authz.fields);

    let sub = field_str(fields, "sub")?.to_string();
    let email = field_str(fields, "email").map(str::to_string);
    let roles = field_str(fields, "roles").map(parse_roles).unwrap_or_default();
    let is_admin = field_str(fields, "is_admin")
        .map(|s| s.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
        || has_admin(&roles);

    Some(Caller {
        user_id: sub,
        source: CallerSource::Authorizer,
        email,
        roles,
        is_admin,
    })
}

fn jwt_caller(req: &Request) -> Option<Caller> {
    let ctx_v2 = match req.request_context_ref()? {
        RequestContext::ApiGatewayV2(ctx) => ctx,
        _ => {
            tracing::debug!("Not an APIGWv2 request");
            return None;
        }
    };
    let authz = ctx_v2.authorizer.as_ref()?;
    let jwt = authz.jwt.as_ref()?;
    let claims = &jwt.claims;

    let sub = claims.get("sub")?;
    let email = claims.get("email").cloned();

    // Optional hardening: pin the issuer with STREAM_JWT_ISS
    if let Ok(expected) = std::env::var("STREAM_JWT_ISS") {
        if !expected.is_empty() {
            let iss = claims.get("iss").map(|v| v.as_str());
            if iss != Some(expected.as_str()) {
                tracing::error!(
                    "JWT issuer mismatch: expected {}, got {:?}",
                    expected,
                    iss
                );
                return None;
            }
        }
    }

    let roles = claims
        .get("cognito:groups")
        .or_else(|| claims.get("roles"))
        .map(|s| parse_roles(s))
        .unwrap_or_default();

    Some(Caller {
        user_id: sub.to_string(),
        source: CallerSource::Jwt,
        email,
        is_admin: has_admin(&roles),
        roles,
    })
}

/// Central entry point: get the caller identity (if any) from the request.
/// Preference order: Lambda authorizer context -> JWT claims
pub fn caller_id(req: &Request) -> Option<Caller> {
    authorizer_caller(req).or_else(|| jwt_caller(req))
}

pub fn require_auth(req: &Request) -> Result<Caller, Unauthorized> {
    caller_id(req).ok_or(Unauthorized)
}
