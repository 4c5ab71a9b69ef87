use thiserror::Error;

/// Errors raised while tracking features through a video.
///
/// `NoFeaturesDetected` and `AllPointsInvalid` are recoverable: the tracking
/// loop logs them, counts them and keeps going. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: usize, reason: String },

    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("no features detected on frame {frame}")]
    NoFeaturesDetected { frame: usize },

    #[error("all {tracked} tracked points were lost on frame {frame}")]
    AllPointsInvalid { frame: usize, tracked: usize },

    #[error("flow result holds {got} matches for {expected} input points")]
    LengthMismatch { expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("visualization error: {0}")]
    Visualization(String),
}

impl FlowError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FlowError::NoFeaturesDetected { .. } | FlowError::AllPointsInvalid { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
