//! Silero VAD backend (ONNX, feature `onnx`).
//!
//! Wraps the Silero VAD v5 model published at
//! <https://github.com/snakers4/silero-vad>, scoring one fixed
//! 512-sample window per call. The GRU state persists across windows
//! within a session and is zeroed on close.
//!
//! ## Model I/O
//!
//! | Name     | Shape       | DType | Direction |
//! |----------|-------------|-------|-----------|
//! | `input`  | `[1, 512]`  | f32   | in        |
//! | `sr`     | `[1]`       | i64   | in        |
//! | `state`  | `[2,1,128]` | f32   | in/out    |
//! | `output` | `[1, 1]`    | f32   | out       |
//! | `stateN` | `[2,1,128]` | f32   | out       |

use std::path::PathBuf;

use ndarray::{Array1, Array2, Array3};
use ort::session::builder::SessionBuilder;
use ort::session::SessionInputValue;
use ort::value::Value;
use tracing::info;

use super::{FrameScore, VadBackend, VadSession};
use crate::error::{LimenError, Result};

/// The only window size the model accepts (samples at 16 kHz = 32 ms).
pub const SILERO_HOP: usize = 512;

/// GRU state size: 2 layers × 1 batch × 128 units.
const STATE_SIZE: usize = 256;

/// Factory for [`SileroSession`].
#[derive(Debug, Clone)]
pub struct SileroBackend {
    model_path: PathBuf,
}

impl SileroBackend {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl VadBackend for SileroBackend {
    fn version(&self) -> String {
        format!("silero-vad v5 / limen {}", env!("CARGO_PKG_VERSION"))
    }

    fn open(&self, hop_size: usize, threshold: f32) -> Result<Box<dyn VadSession>> {
        if hop_size != SILERO_HOP {
            return Err(LimenError::InvalidConfig(format!(
                "silero requires a {SILERO_HOP}-sample hop, got {hop_size}"
            )));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LimenError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {threshold}"
            )));
        }
        if !self.model_path.exists() {
            return Err(LimenError::ModelNotFound {
                path: self.model_path.clone(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(|e| LimenError::OnnxSession(e.to_string()))?
            .commit_from_file(&self.model_path)
            .map_err(|e| LimenError::OnnxSession(e.to_string()))?;

        info!(path = %self.model_path.display(), threshold, "silero session ready");

        Ok(Box::new(SileroSession {
            session: Some(session),
            threshold,
            state: vec![0.0; STATE_SIZE],
            input_buf: Vec::with_capacity(SILERO_HOP),
        }))
    }
}

/// One live Silero session.
pub struct SileroSession {
    /// `None` once closed.
    session: Option<ort::session::Session>,
    threshold: f32,
    /// GRU state, `[2, 1, 128]` row-major.
    state: Vec<f32>,
    /// Reused f32 conversion buffer for the current window.
    input_buf: Vec<f32>,
}

impl VadSession for SileroSession {
    fn process(&mut self, window: &[i16]) -> Result<FrameScore> {
        let Some(session) = self.session.as_mut() else {
            return Err(LimenError::SessionClosed);
        };
        if window.len() != SILERO_HOP {
            return Err(LimenError::WindowLength {
                expected: SILERO_HOP,
                got: window.len(),
            });
        }

        self.input_buf.clear();
        self.input_buf
            .extend(window.iter().map(|&s| s as f32 / i16::MAX as f32));

        let input_arr = Array2::<f32>::from_shape_vec((1, SILERO_HOP), self.input_buf.clone())
            .map_err(|e| LimenError::OnnxSession(e.to_string()))?;
        let sr_arr = Array1::<i64>::from_elem(1, 16_000i64);
        let state_arr = Array3::<f32>::from_shape_vec((2, 1, 128), self.state.clone())
            .map_err(|e| LimenError::OnnxSession(e.to_string()))?;

        let input_val = Value::from_array(input_arr)
            .map_err(|e: ort::Error| LimenError::OnnxSession(e.to_string()))?;
        let sr_val = Value::from_array(sr_arr)
            .map_err(|e: ort::Error| LimenError::OnnxSession(e.to_string()))?;
        let state_val = Value::from_array(state_arr)
            .map_err(|e: ort::Error| LimenError::OnnxSession(e.to_string()))?;

        let inputs: Vec<(String, SessionInputValue<'_>)> = vec![
            ("input".to_string(), input_val.into()),
            ("sr".to_string(), sr_val.into()),
            ("state".to_string(), state_val.into()),
        ];

        let outputs = session
            .run(inputs)
            .map_err(|e| LimenError::OnnxSession(e.to_string()))?;

        let prob_output = outputs.get("output").unwrap_or(&outputs[0]);
        let (_, prob_data) = prob_output
            .try_extract_tensor::<f32>()
            .map_err(|e| LimenError::OnnxSession(e.to_string()))?;
        let probability = prob_data.first().copied().unwrap_or(0.0);

        if let Some(state_out) = outputs.get("stateN") {
            let (_, state_data) = state_out
                .try_extract_tensor::<f32>()
                .map_err(|e| LimenError::OnnxSession(e.to_string()))?;
            self.state = state_data.to_vec();
        }

        Ok(FrameScore {
            probability,
            is_speech: probability >= self.threshold,
        })
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the ort session releases the runtime; repeat closes
        // are no-ops.
        self.session = None;
        self.state.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }
}
