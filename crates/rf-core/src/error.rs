//! Error types for the voice mixing engine.
//!
//! Kinds follow spec §7: invalid argument, invalid state, effect
//! failure, queue underrun, and fatal (scratch-cache growth) errors.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum RfError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid voice state: {0}")]
    InvalidState(String),

    #[error("effect failure in chain slot {slot}: {reason}")]
    EffectFailure { slot: usize, reason: String },

    #[error("buffer queue underrun")]
    QueueUnderrun,

    #[error("allocation failure growing scratch cache to {requested} frames")]
    ScratchGrowthFailed { requested: usize },

    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(crate::FormatTag),

    #[error("device mix format is not float32; engine init failed")]
    MixFormatNotFloat32,
}

/// Result type alias.
pub type RfResult<T> = Result<T, RfError>;
