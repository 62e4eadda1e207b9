//! JSON-line wire protocol.
//!
//! One request per line on stdin, one reply per line on stdout:
//!
//! ```text
//! → {"id":1,"method":"initialize","args":{"hopSize":256,"threshold":0.5}}
//! ← {"id":1,"result":{"version":"energy-vad 0.2.1"}}
//! → {"id":2,"method":"processPcm","args":{"pcm":"AAABAA=="}}
//! ← {"id":2,"result":{"speech":false,"probability":0.0}}
//! → {"id":3,"method":"echo"}
//! ← {"id":3,"notImplemented":true}
//! ```
//!
//! A line that does not parse as a request is logged and skipped; the
//! transport owns its own framing and serialization guarantees.

use limen_core::{CallFault, CallReply};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One incoming named call.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    /// Argument map; absent means no arguments.
    #[serde(default)]
    pub args: Value,
}

/// One outgoing reply. Exactly one of the three payload fields is set.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CallFault>,
    #[serde(rename = "notImplemented", skip_serializing_if = "Option::is_none")]
    pub not_implemented: Option<bool>,
}

impl Reply {
    pub fn from_call(id: u64, reply: CallReply) -> Self {
        match reply {
            CallReply::Success(value) => Self {
                id,
                result: Some(value),
                error: None,
                not_implemented: None,
            },
            CallReply::Fault(fault) => Self {
                id,
                result: None,
                error: Some(fault),
                not_implemented: None,
            },
            CallReply::NotImplemented => Self {
                id,
                result: None,
                error: None,
                not_implemented: Some(true),
            },
        }
    }
}
