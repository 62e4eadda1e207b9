//! # limen-core
//!
//! Bridge between a named-call transport and a voice-activity detector.
//!
//! ## Architecture
//!
//! ```text
//! host transport ──► BridgeAdapter::handle_call
//!                        │  initialize / processPcm / release
//!                        ▼
//!                VadBackend::open ──► VadSession::process (one window)
//!                        │
//!                ChunkVerdict { speech, probability }
//! ```
//!
//! The adapter owns no detection logic: it decodes little-endian 16-bit
//! PCM, slices complete analysis windows, forwards each window to the
//! detector session and folds the per-window scores into one verdict
//! per chunk.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod bridge;
pub mod engine;
pub mod error;
pub mod pcm;
pub mod wire;

// Convenience re-exports for downstream crates
pub use bridge::BridgeAdapter;
pub use engine::{EnergyBackend, FrameScore, VadBackend, VadSession};
pub use error::LimenError;
pub use wire::{CallFault, CallReply, ChunkVerdict, FaultKind};

#[cfg(feature = "onnx")]
pub use engine::SileroBackend;
