//! Detector backend abstraction.
//!
//! `VadBackend` and `VadSession` together mirror the contract of a
//! native VAD library: construct a detector for a fixed hop size and
//! threshold, score one window at a time, destroy it when done. The
//! bridge adapter is written against these traits only, so backends can
//! be swapped without touching the call surface.

pub mod energy;

#[cfg(feature = "onnx")]
pub mod silero;

#[cfg(feature = "onnx")]
pub use silero::SileroBackend;

pub use energy::EnergyBackend;

use serde::Serialize;

use crate::error::Result;

/// Score for exactly one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameScore {
    /// Speech probability in [0.0, 1.0].
    pub probability: f32,
    /// Whether the window cleared the configured threshold.
    pub is_speech: bool,
}

/// Factory side of the detector contract.
pub trait VadBackend: Send {
    /// Version identifier reported to the caller by `initialize`.
    fn version(&self) -> String;

    /// Open a detector session scoring `hop_size` samples per window
    /// against a speech threshold in [0.0, 1.0].
    ///
    /// # Errors
    /// Rejects configurations the detector cannot honour: a zero hop,
    /// a threshold outside [0, 1], an unsupported window size, or a
    /// missing model file.
    fn open(&self, hop_size: usize, threshold: f32) -> Result<Box<dyn VadSession>>;
}

/// One live detector instance.
///
/// Implementors may be stateful (RNN hidden state, smoothing counters).
/// `close` must be safe to call more than once: after a failed release
/// the bridge keeps the session and the caller is free to retry.
pub trait VadSession: Send {
    /// Score exactly one window of the configured hop size.
    ///
    /// # Errors
    /// Fails if `window` is not exactly the hop size this session was
    /// opened with, or if the session has already been closed.
    fn process(&mut self, window: &[i16]) -> Result<FrameScore>;

    /// Release the detector's resources.
    fn close(&mut self) -> Result<()>;
}
