use thiserror::Error;

/// All errors produced by limen-core.
#[derive(Debug, Error)]
pub enum LimenError {
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("detector session error: {0}")]
    Session(String),

    #[error("detector session is closed")]
    SessionClosed,

    #[error("window length mismatch: expected {expected} samples, got {got}")]
    WindowLength { expected: usize, got: usize },

    #[error("malformed call arguments: {0}")]
    BadArguments(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },
}

pub type Result<T> = std::result::Result<T, LimenError>;
