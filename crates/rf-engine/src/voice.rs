//! Voice data model (spec §3, component C9).
//!
//! `VoiceCommon` holds the attributes every voice kind shares (output
//! channel count, per-channel volume, overall volume, optional filter,
//! effect chain, sends); `SourceVoice`/`SubmixVoice`/`MasterVoice`
//! compose it with their kind-specific extras.

use rf_audio::{NoEvents, QueueEvents, SourceQueue};
use rf_core::{Fixed, RfError, RfResult, Sample, VoiceConfig, VoiceId, WaveFormat, MAX_VOICE_CHANNELS};
use rf_dsp::StateVariableFilter;
use smallvec::SmallVec;

use crate::channel_matrix::default_matrix;
use crate::effect::EffectChain;
use crate::mixer::{NoPassEvents, PassEvents};

/// A (destination, channel mix matrix) pair (spec §3, glossary "Send").
/// `matrix` is row-major `[dst_channel * src_channels + src_channel]`.
pub struct Send {
    pub destination: VoiceId,
    pub matrix: SmallVec<[f32; 64]>,
}

impl Send {
    /// A send with the default channel matrix (spec §6).
    pub fn with_default_matrix(destination: VoiceId, src_channels: u16, dst_channels: u16) -> Self {
        Self {
            destination,
            matrix: default_matrix(src_channels, dst_channels),
        }
    }

    pub fn with_matrix(destination: VoiceId, matrix: SmallVec<[f32; 64]>) -> Self {
        Self { destination, matrix }
    }
}

/// Attributes shared by every voice kind (spec §3 "Voice (variant)").
pub struct VoiceCommon {
    /// Channel count this voice presents to its sends — for source and
    /// submix voices, the channel count *after* the effect chain.
    pub output_channels: u16,
    pub channel_volume: SmallVec<[f32; MAX_VOICE_CHANNELS]>,
    pub volume: f32,
    pub filter: Option<StateVariableFilter>,
    pub effects: EffectChain,
    pub sends: SmallVec<[Send; 4]>,
}

impl VoiceCommon {
    pub fn new(output_channels: u16) -> Self {
        Self {
            output_channels,
            channel_volume: smallvec::smallvec![1.0; output_channels as usize],
            volume: 1.0,
            filter: None,
            effects: EffectChain::new(),
            sends: SmallVec::new(),
        }
    }

    pub fn enable_filter(&mut self) {
        self.filter = Some(StateVariableFilter::new(self.output_channels as usize));
    }

    /// Apply per-voice init options (spec §6). Currently only
    /// `USE_FILTER` has a voice-level effect: it reserves filter state
    /// up front so `SetFilterParameters` has somewhere to write.
    fn apply_config(&mut self, config: VoiceConfig) {
        if config.use_filter {
            self.enable_filter();
        }
    }

    pub fn add_send(&mut self, send: Send) {
        self.sends.push(send);
    }
}

/// Source voice (spec §3 "Source voice extra").
pub struct SourceVoice {
    pub common: VoiceCommon,
    pub format: WaveFormat,
    pub freq_ratio: f64,
    pub resample_step: Fixed,
    /// Destination rate the cached `resample_step` was computed for;
    /// a change invalidates the cache (spec §4.7.1 step 1).
    last_output_rate: u32,
    pub queue: SourceQueue,
    pub frac_offset: Fixed,
    pub active: bool,
    /// Buffer-queue completion callbacks (spec §3 "optional callback
    /// set"). Defaults to a no-op sink.
    pub queue_events: Box<dyn QueueEvents>,
    /// Processing-pass start/end callbacks. Defaults to a no-op sink.
    pub pass_events: Box<dyn PassEvents>,
}

impl SourceVoice {
    pub fn new(format: WaveFormat, output_channels: u16, config: VoiceConfig) -> Self {
        let mut common = VoiceCommon::new(output_channels);
        common.apply_config(config);
        Self {
            common,
            format,
            freq_ratio: 1.0,
            resample_step: Fixed::ONE,
            last_output_rate: 0,
            queue: SourceQueue::new(),
            frac_offset: Fixed::ZERO,
            active: false,
            queue_events: Box::new(NoEvents),
            pass_events: Box::new(NoPassEvents),
        }
    }

    pub fn set_events(&mut self, queue_events: Box<dyn QueueEvents>, pass_events: Box<dyn PassEvents>) {
        self.queue_events = queue_events;
        self.pass_events = pass_events;
    }

    pub fn start(&mut self) -> RfResult<()> {
        if self.active {
            return Err(RfError::InvalidState("source voice already started".into()));
        }
        self.active = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Recompute `resample_step` if `freqRatio` or the destination rate
    /// changed since the last tick (spec §4.7.1 step 1).
    pub fn refresh_resample_step(&mut self, output_rate: u32) {
        if output_rate != self.last_output_rate {
            self.resample_step = Fixed::from_ratio(self.freq_ratio, self.format.sample_rate, output_rate);
            self.last_output_rate = output_rate;
        }
    }

    pub fn set_freq_ratio(&mut self, ratio: f64) {
        self.freq_ratio = ratio;
        // Force recompute on the next tick even if output_rate is unchanged.
        self.last_output_rate = 0;
    }
}

/// Submix voice (spec §3 "Submix voice extra").
pub struct SubmixVoice {
    pub common: VoiceCommon,
    pub input_rate: u32,
    pub input_channels: u16,
    pub input_cache: Vec<Sample>,
    pub stage: u32,
}

impl SubmixVoice {
    pub fn new(input_channels: u16, input_rate: u32, output_channels: u16, stage: u32, config: VoiceConfig) -> Self {
        let mut common = VoiceCommon::new(output_channels);
        common.apply_config(config);
        Self {
            common,
            input_rate,
            input_channels,
            input_cache: Vec::new(),
            stage,
        }
    }

    /// Grow (never shrink) `input_cache` to hold `frames` frames and
    /// zero any newly added tail.
    pub fn ensure_input_cache(&mut self, frames: usize) {
        let needed = frames * self.input_channels as usize;
        if self.input_cache.len() < needed {
            self.input_cache.resize(needed, 0.0);
        }
    }

    pub fn clear_input_cache(&mut self) {
        self.input_cache[..].fill(0.0);
    }
}

/// Master voice (spec §3 "Master voice extra"). `accum` replaces the
/// original's raw pointer into the platform's period buffer: voices mix
/// into this engine-owned buffer, and the engine tick copies it into
/// the caller's output slice at master finalize (spec §4.7.3).
pub struct MasterVoice {
    pub common: VoiceCommon,
    pub sample_rate: u32,
    pub accum: Vec<Sample>,
}

impl MasterVoice {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            common: VoiceCommon::new(channels),
            sample_rate,
            accum: Vec::new(),
        }
    }

    pub fn ensure_accum(&mut self, frames: usize) {
        let needed = frames * self.common.output_channels as usize;
        if self.accum.len() < needed {
            self.accum.resize(needed, 0.0);
        }
    }

    pub fn clear_accum(&mut self) {
        self.accum[..].fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_filter_reserves_filter_state_on_source() {
        let format = WaveFormat::pcm16(1, 48_000);
        let voice = SourceVoice::new(format, 1, VoiceConfig { use_filter: true });
        assert!(voice.common.filter.is_some());
    }

    #[test]
    fn default_config_leaves_filter_unset() {
        let format = WaveFormat::pcm16(1, 48_000);
        let voice = SourceVoice::new(format, 1, VoiceConfig::default());
        assert!(voice.common.filter.is_none());
    }

    #[test]
    fn use_filter_reserves_filter_state_on_submix() {
        let voice = SubmixVoice::new(2, 48_000, 2, 0, VoiceConfig { use_filter: true });
        assert!(voice.common.filter.is_some());
    }
}
