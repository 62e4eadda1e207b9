//! Types crossing the named-call surface.
//!
//! Argument maps arrive as JSON objects with camelCase keys; results go
//! back the same way. PCM bytes cross the wire base64-encoded since raw
//! bytes have no JSON representation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LimenError, Result};

/// Hop size used when `initialize` is called without one.
pub const DEFAULT_HOP_SIZE: usize = 256;

/// Detection threshold used when `initialize` is called without one.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Arguments of `initialize`; both fields optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitArgs {
    #[serde(default)]
    pub hop_size: Option<u32>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

/// Success payload of `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReply {
    /// Detector backend version identifier.
    pub version: String,
}

/// Arguments of `processPcm`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PcmArgs {
    /// Base64-encoded little-endian 16-bit mono PCM.
    #[serde(default)]
    pub pcm: Option<String>,
}

impl PcmArgs {
    /// Decode the payload; a missing field behaves as an empty buffer.
    ///
    /// # Errors
    /// Fails when the field is present but not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>> {
        match &self.pcm {
            None => Ok(Vec::new()),
            Some(text) => BASE64
                .decode(text)
                .map_err(|e| LimenError::BadArguments(format!("pcm is not valid base64: {e}"))),
        }
    }
}

/// Encode a PCM buffer for the wire.
pub fn encode_pcm(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Aggregated per-chunk answer of `processPcm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkVerdict {
    /// True when any complete window in the chunk was classified as speech.
    pub speech: bool,
    /// Maximum per-window probability observed across the chunk.
    pub probability: f32,
}

impl ChunkVerdict {
    /// The defined answer when no window was evaluated.
    pub const SILENT: ChunkVerdict = ChunkVerdict {
        speech: false,
        probability: 0.0,
    };
}

/// Which operation a fault belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    InitFailed,
    ProcessFailed,
    ReleaseFailed,
}

/// Structured error surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFault {
    pub kind: FaultKind,
    /// Underlying failure message, passed through verbatim.
    pub message: String,
}

/// Outcome of one named call.
#[derive(Debug, Clone)]
pub enum CallReply {
    /// Operation succeeded; payload is the operation's result value.
    Success(Value),
    /// Operation failed with a structured fault.
    Fault(CallFault),
    /// The operation name is not part of the bridge surface.
    NotImplemented,
}
