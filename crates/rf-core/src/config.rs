//! Engine/voice configuration options recognized at init (spec §6).

use serde::{Deserialize, Serialize};

/// Processor affinity hint for the mixer thread. Advisory only; the
/// platform layer may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorAffinity {
    Any,
    Core(u32),
}

impl Default for ProcessorAffinity {
    fn default() -> Self {
        Self::Any
    }
}

/// Engine-wide init options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Frames produced per tick (typically a 10ms period's worth).
    pub update_size: u32,
    /// Master mix sample rate.
    pub master_sample_rate: u32,
    /// Master channel count.
    pub master_channels: u16,
    pub default_processor: ProcessorAffinity,
    /// `DEBUG_ENGINE`: enables assertions/tracing.
    pub debug_engine: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_size: 441,
            master_sample_rate: 44_100,
            master_channels: 2,
            default_processor: ProcessorAffinity::Any,
            debug_engine: false,
        }
    }
}

/// Per-voice init options.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// `USE_FILTER`: reserves filter state and enables
    /// `SetFilterParameters`.
    pub use_filter: bool,
}
