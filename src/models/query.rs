use serde::{Deserialize, Serialize};

/// `GET /current?path=...&at=<seq>`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CurrentParams {
    pub path: Option<String>,
    pub at: Option<u64>,
}

/// `GET /sample?path=...&from=<seq>&count=<n>&interval=<ms>`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SampleParams {
    pub path: Option<String>,
    pub from: Option<u64>,
    #[serde(default = "default_count")]
    pub count: u64,
    pub interval: Option<u64>,
}

fn default_count() -> u64 {
    100
}

/// `GET /assets?type=<t>&count=<n>`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetsParams {
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub count: Option<u64>,
}

/// `GET /probe?path=...` — device/component/dataitem filter only, no values.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProbeParams {
    pub path: Option<String>,
}

/// MTConnect client-facing error document (`spec.md` §7 "Client-facing").
#[derive(Debug, Clone, Serialize)]
pub struct MTConnectError {
    pub error_code: String,
    pub message: String,
}

impl MTConnectError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
