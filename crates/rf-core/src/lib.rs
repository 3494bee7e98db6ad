//! rf-core: Shared types for the FluxForge real-time voice mixing engine
//!
//! This crate provides the foundational types shared by `rf-dsp`,
//! `rf-audio`, and `rf-engine`: sample types, fixed-point resample
//! phase arithmetic, the wire-level buffer descriptors, voice/effect
//! identifiers, and the error type.

mod error;
mod fixed;
mod buffer;
mod ids;
mod format;
mod config;

pub use error::*;
pub use fixed::*;
pub use buffer::*;
pub use ids::*;
pub use format::*;
pub use config::*;

/// A single mixed audio sample. The engine's mix format is always
/// interleaved float32 (§6: "Mixing format").
pub type Sample = f32;

/// Sentinel for "no loop" vs. infinite looping on [`AudioBuffer::loop_count`].
pub const LOOP_INFINITE: u32 = u32::MAX;

/// Per-tick padding decoded past the requested frame count so the
/// resampler's `s1` lookahead never reads uninitialized memory.
pub const EXTRA_DECODE_PADDING: usize = 16;

/// Output samples are clamped to this range at every mix accumulation
/// point and at master finalize (P8). Matches `FAUDIO_MAX_VOLUME_LEVEL`
/// (2^24), not an arbitrary headroom figure — many simultaneous voices
/// summing above 16.0 is a normal, valid mix.
pub const MAX_VOLUME_LEVEL: Sample = 16_777_216.0;

/// Maximum channels supported by a single voice (spec §6 default
/// channel matrices run `1..8`).
pub const MAX_VOICE_CHANNELS: usize = 8;

/// Clamp a mixed sample into `[-MAX_VOLUME_LEVEL, +MAX_VOLUME_LEVEL]`.
#[inline]
pub fn clamp_volume(x: Sample) -> Sample {
    x.clamp(-MAX_VOLUME_LEVEL, MAX_VOLUME_LEVEL)
}
