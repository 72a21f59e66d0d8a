use lambda_runtime::{service_fn, Error as LambdaError, LambdaEvent};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use streamsign::{LinkVerifier, StreamConfig};

#[derive(Serialize)]
struct SimpleAuthz {
    #[serde(rename = "isAuthorized")]
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<HashMap<String, String>>,
}

fn get_str<'a>(evt: &'a JsonValue, name: &str) -> Option<&'a str> {
    evt.get(name)?.as_str()
}

fn authorize(verifier: &LinkVerifier, evt: &JsonValue) -> SimpleAuthz {
    let path = get_str(evt, "rawPath").unwrap_or("");
    let query = get_str(evt, "rawQueryString").unwrap_or("");

    match verifier.verify_request(path, query) {
        Ok(v) => {
            let mut ctx = HashMap::new();
            ctx.insert("resource".into(), v.resource);
            ctx.insert("expires".into(), v.expires.to_string());
            SimpleAuthz {
                ok: true,
                context: Some(ctx),
            }
        }
        Err(e) => {
            tracing::info!(path, "stream link rejected: {e}");
            SimpleAuthz {
                ok: false,
                context: None,
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let config = StreamConfig::from_env()?;
    let verifier = Arc::new(LinkVerifier::new(&config));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<JsonValue>| {
        let verifier = verifier.clone();
        async move { Ok::<_, LambdaError>(json!(authorize(&verifier, &event.payload))) }
    }))
    .await
}
