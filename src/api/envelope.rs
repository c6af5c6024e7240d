//! Primary backend event envelope
//!
//! Content frames look like
//! `{"retcode": 0, "retmsg": "", "data": {"answer": "...", "reference": [], "id": "..."}}`.

use serde::{Deserialize, Serialize};

/// Status code of a successful content event
pub const RETCODE_OK: i64 = 0;

/// Status code used for errors raised by the proxy itself
pub const RETCODE_PROXY_ERROR: i64 = 1;

/// Answer payload carried in `data`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AnswerData {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub reference: Vec<serde_json::Value>,
    #[serde(default)]
    pub id: String,
}

/// Serialized form of a content event produced by the proxy
#[derive(Debug, Serialize)]
pub struct ContentEnvelope<'a> {
    pub retcode: i64,
    pub retmsg: &'a str,
    pub data: &'a AnswerData,
}
