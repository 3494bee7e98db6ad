//! Sample format converters (spec §4.1, component C1).
//!
//! Two conversions, bit-exact across every backend:
//! - U8→F32: `out = in * (1/128) - 1.0` (midpoint 128 → 0.0)
//! - S16→F32: `out = in * (1/32768)` (-32768 → -1.0, 32767 → ~0.99997)
//!
//! At init the engine probes the platform and picks SSE2, NEON, or
//! scalar. Per spec §9 ("Function pointers for decoders and SIMD
//! converters"), dispatch is a single enum match per call rather than
//! an indirect function-pointer call on the per-sample path — the
//! inner per-chunk loops below are always direct calls, inlineable by
//! the optimizer.
//!
//! SIMD variants walk the buffer back-to-front (spec §4.1) so they
//! may be called with overlapping, aligned, in-place conversions when
//! the output is wider than the input (as for S16→F32, 2 bytes in for
//! every 4 bytes out). The scalar fallback handles head/tail
//! remainders after the vector loop.

use std::sync::OnceLock;

const U8_SCALE: f32 = 1.0 / 128.0;
const S16_SCALE: f32 = 1.0 / 32768.0;

/// Detected SIMD capability level for the sample converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    Scalar,
    Sse2,
    Neon,
}

static DETECTED: OnceLock<SimdLevel> = OnceLock::new();

/// Probe the platform once and cache the result (called at engine
/// init, spec §4.1: "At engine init a platform probe sets them").
pub fn simd_level() -> SimdLevel {
    *DETECTED.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("sse2") {
                return SimdLevel::Sse2;
            }
            SimdLevel::Scalar
        }
        #[cfg(target_arch = "aarch64")]
        {
            SimdLevel::Neon
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            SimdLevel::Scalar
        }
    })
}

// ============ Scalar reference (ground truth for both backends) ============

#[inline]
fn scalar_u8_to_f32(input: &[u8], output: &mut [f32]) {
    for (o, &i) in output.iter_mut().zip(input.iter()) {
        *o = i as f32 * U8_SCALE - 1.0;
    }
}

#[inline]
fn scalar_s16_to_f32(input: &[i16], output: &mut [f32]) {
    for (o, &i) in output.iter_mut().zip(input.iter()) {
        *o = i as f32 * S16_SCALE;
    }
}

// ============ Public entry points ============

/// Convert unsigned 8-bit PCM to float32. `output.len()` must be `>=
/// input.len()`; excess output is left untouched.
pub fn convert_u8_to_f32(input: &[u8], output: &mut [f32]) {
    let n = input.len();
    debug_assert!(output.len() >= n);
    match simd_level() {
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Sse2 => unsafe { sse2::u8_to_f32(input, &mut output[..n]) },
        #[cfg(target_arch = "aarch64")]
        SimdLevel::Neon => unsafe { neon::u8_to_f32(input, &mut output[..n]) },
        _ => scalar_u8_to_f32(input, &mut output[..n]),
    }
}

/// Convert signed 16-bit PCM to float32. `output.len()` must be `>=
/// input.len()`; excess output is left untouched.
pub fn convert_s16_to_f32(input: &[i16], output: &mut [f32]) {
    let n = input.len();
    debug_assert!(output.len() >= n);
    match simd_level() {
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Sse2 => unsafe { sse2::s16_to_f32(input, &mut output[..n]) },
        #[cfg(target_arch = "aarch64")]
        SimdLevel::Neon => unsafe { neon::s16_to_f32(input, &mut output[..n]) },
        _ => scalar_s16_to_f32(input, &mut output[..n]),
    }
}

#[cfg(target_arch = "x86_64")]
mod sse2 {
    use super::{scalar_s16_to_f32, scalar_u8_to_f32};
    use std::arch::x86_64::*;

    const LANES: usize = 16;

    /// # Safety
    /// Caller must have already verified SSE2 is available
    /// (guaranteed on all x86_64 targets, but gated through
    /// `simd_level()` for symmetry with the NEON path).
    #[target_feature(enable = "sse2")]
    pub unsafe fn u8_to_f32(input: &[u8], output: &mut [f32]) {
        let n = input.len();
        let full_chunks = n / LANES;
        let scale = _mm_set1_ps(super::U8_SCALE);
        let one = _mm_set1_ps(1.0);

        // Back-to-front: last full chunk first, walking toward index 0.
        for chunk in (0..full_chunks).rev() {
            let base = chunk * LANES;
            let bytes = _mm_loadu_si128(input.as_ptr().add(base) as *const __m128i);
            let zero = _mm_setzero_si128();
            let u16_lo = _mm_unpacklo_epi8(bytes, zero);
            let u16_hi = _mm_unpackhi_epi8(bytes, zero);
            let groups = [
                _mm_unpacklo_epi16(u16_lo, zero),
                _mm_unpackhi_epi16(u16_lo, zero),
                _mm_unpacklo_epi16(u16_hi, zero),
                _mm_unpackhi_epi16(u16_hi, zero),
            ];
            for (g, group) in groups.iter().enumerate() {
                let as_f32 = _mm_cvtepi32_ps(*group);
                let converted = _mm_sub_ps(_mm_mul_ps(as_f32, scale), one);
                _mm_storeu_ps(output.as_mut_ptr().add(base + g * 4), converted);
            }
        }

        let tail_start = full_chunks * LANES;
        scalar_u8_to_f32(&input[tail_start..], &mut output[tail_start..]);
    }

    /// # Safety
    /// See [`u8_to_f32`].
    #[target_feature(enable = "sse2")]
    pub unsafe fn s16_to_f32(input: &[i16], output: &mut [f32]) {
        let n = input.len();
        const LANES16: usize = 8;
        let full_chunks = n / LANES16;
        let scale = _mm_set1_ps(super::S16_SCALE);

        for chunk in (0..full_chunks).rev() {
            let base = chunk * LANES16;
            let shorts = _mm_loadu_si128(input.as_ptr().add(base) as *const __m128i);
            // Sign-extend 16-bit lanes to 32-bit via unpack-with-self +
            // arithmetic shift (classic SSE2 sign-extension idiom).
            let lo = _mm_srai_epi32(_mm_unpacklo_epi16(shorts, shorts), 16);
            let hi = _mm_srai_epi32(_mm_unpackhi_epi16(shorts, shorts), 16);
            let lo_f = _mm_mul_ps(_mm_cvtepi32_ps(lo), scale);
            let hi_f = _mm_mul_ps(_mm_cvtepi32_ps(hi), scale);
            _mm_storeu_ps(output.as_mut_ptr().add(base), lo_f);
            _mm_storeu_ps(output.as_mut_ptr().add(base + 4), hi_f);
        }

        let tail_start = full_chunks * LANES16;
        scalar_s16_to_f32(&input[tail_start..], &mut output[tail_start..]);
    }
}

#[cfg(target_arch = "aarch64")]
mod neon {
    use super::{scalar_s16_to_f32, scalar_u8_to_f32};
    use std::arch::aarch64::*;

    const LANES: usize = 16;

    /// # Safety
    /// NEON is part of the aarch64 baseline, so this is safe to call
    /// unconditionally on that target.
    #[target_feature(enable = "neon")]
    pub unsafe fn u8_to_f32(input: &[u8], output: &mut [f32]) {
        let n = input.len();
        let full_chunks = n / LANES;

        for chunk in (0..full_chunks).rev() {
            let base = chunk * LANES;
            let bytes = vld1q_u8(input.as_ptr().add(base));
            let u16_lo = vmovl_u8(vget_low_u8(bytes));
            let u16_hi = vmovl_u8(vget_high_u8(bytes));
            let groups = [
                vmovl_u16(vget_low_u16(u16_lo)),
                vmovl_u16(vget_high_u16(u16_lo)),
                vmovl_u16(vget_low_u16(u16_hi)),
                vmovl_u16(vget_high_u16(u16_hi)),
            ];
            for (g, group) in groups.iter().enumerate() {
                let as_f32 = vcvtq_f32_u32(*group);
                let converted = vsubq_f32(
                    vmulq_n_f32(as_f32, super::U8_SCALE),
                    vdupq_n_f32(1.0),
                );
                vst1q_f32(output.as_mut_ptr().add(base + g * 4), converted);
            }
        }

        let tail_start = full_chunks * LANES;
        scalar_u8_to_f32(&input[tail_start..], &mut output[tail_start..]);
    }

    /// # Safety
    /// See [`u8_to_f32`].
    #[target_feature(enable = "neon")]
    pub unsafe fn s16_to_f32(input: &[i16], output: &mut [f32]) {
        let n = input.len();
        const LANES16: usize = 8;
        let full_chunks = n / LANES16;

        for chunk in (0..full_chunks).rev() {
            let base = chunk * LANES16;
            let shorts = vld1q_s16(input.as_ptr().add(base));
            let lo = vmovl_s16(vget_low_s16(shorts));
            let hi = vmovl_s16(vget_high_s16(shorts));
            let lo_f = vmulq_n_f32(vcvtq_f32_s32(lo), super::S16_SCALE);
            let hi_f = vmulq_n_f32(vcvtq_f32_s32(hi), super::S16_SCALE);
            vst1q_f32(output.as_mut_ptr().add(base), lo_f);
            vst1q_f32(output.as_mut_ptr().add(base + 4), hi_f);
        }

        let tail_start = full_chunks * LANES16;
        scalar_s16_to_f32(&input[tail_start..], &mut output[tail_start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_roundtrip_p1() {
        // P1: round-trip U8->F32->U8 is exact for all 256 inputs
        // after rounding half-away-from-zero.
        let input: Vec<u8> = (0..=255u8).collect();
        let mut out = vec![0.0f32; input.len()];
        convert_u8_to_f32(&input, &mut out);
        for (orig, &f) in input.iter().zip(out.iter()) {
            let back = (((f + 1.0) * 128.0).round()).clamp(0.0, 255.0) as u8;
            assert_eq!(back, *orig, "u8 {orig} -> {f} -> {back}");
        }
    }

    #[test]
    fn s16_roundtrip_sampled_p2() {
        // P2 exhaustively covers all 65536 inputs; sample densely here
        // to keep the unit test fast while still exercising both
        // extremes and the midpoint.
        let mut input: Vec<i16> = (i16::MIN..=i16::MAX).step_by(7).collect();
        input.push(i16::MAX);
        let mut out = vec![0.0f32; input.len()];
        convert_s16_to_f32(&input, &mut out);
        for (&orig, &f) in input.iter().zip(out.iter()) {
            let back = (f * 32768.0).round().clamp(-32768.0, 32767.0) as i32;
            assert_eq!(back, orig as i32, "s16 {orig} -> {f} -> {back}");
        }
    }

    #[test]
    fn u8_midpoint_maps_to_zero() {
        let mut out = [1.0f32];
        convert_u8_to_f32(&[128], &mut out);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn s16_extremes() {
        let mut out = [0.0f32; 2];
        convert_s16_to_f32(&[-32768, 32767], &mut out);
        assert_eq!(out[0], -1.0);
        assert!((out[1] - 0.99996948).abs() < 1e-6);
    }

    #[test]
    fn simd_matches_scalar_on_unaligned_lengths() {
        let input: Vec<u8> = (0..137).map(|i| (i * 3) as u8).collect();
        let mut simd_out = vec![0.0f32; input.len()];
        let mut scalar_out = vec![0.0f32; input.len()];
        convert_u8_to_f32(&input, &mut simd_out);
        scalar_u8_to_f32(&input, &mut scalar_out);
        assert_eq!(simd_out, scalar_out);
    }
}
