//! rf-dsp: SIMD sample converters and the per-voice state-variable
//! filter.
//!
//! ## Modules
//! - `simd` — runtime-dispatched U8→F32 / S16→F32 converters (C1)
//! - `filter` — state-variable low/high/band/notch filter (C5)

pub mod filter;
pub mod simd;

pub use filter::{FilterParams, FilterType, StateVariableFilter};
pub use simd::{convert_s16_to_f32, convert_u8_to_f32, simd_level, SimdLevel};
