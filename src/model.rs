use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SignReq {
    pub resource: String,
    #[serde(default)]
    pub expiry_minutes: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SignResp {
    pub url: String,
    pub path: String,
    pub expires: u64, // epoch seconds, same value as the `expires` query param
    pub expiry_minutes: u32,
}
