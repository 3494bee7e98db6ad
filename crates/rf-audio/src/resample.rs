//! Linear fractional resampler (spec §4.4, component C4).
//!
//! Walks the decode cache with a Q32.32 phase accumulator, writing
//! `out_frames` frames to the (shared) resample cache. When the step
//! is exactly unity the caller should prefer a plain copy — tested
//! here too, but the common fast path lives in the voice mixer so it
//! can skip the per-sample loop entirely.

use rf_core::{Fixed, Sample};

/// Resample `channels`-wide interleaved frames from `src` into `dst`,
/// producing `out_frames` output frames. `cur_frac` is the phase
/// accumulator's fractional part on entry (in `[0, FIXED_ONE)`); it is
/// updated to reflect the state after `out_frames` have been produced.
/// `src` must contain at least `ceil((out_frames*step + cur_frac) /
/// FIXED_ONE) + 1` input frames (the `+1` covers the final `s1` look-ahead).
pub fn resample_linear(
    src: &[Sample],
    dst: &mut [Sample],
    channels: usize,
    step: Fixed,
    cur_frac: &mut Fixed,
    out_frames: u64,
) {
    debug_assert!(dst.len() >= out_frames as usize * channels);

    let mut cur = cur_frac.frac_part();
    let mut src_off = 0usize;

    for i in 0..out_frames as usize {
        let s0 = &src[src_off * channels..src_off * channels + channels];
        let s1 = &src[(src_off + 1) * channels..(src_off + 1) * channels + channels];
        let frac = (cur as f64 / rf_core::FIXED_ONE as f64) as f32;
        for c in 0..channels {
            dst[i * channels + c] = s0[c] + (s1[c] - s0[c]) * frac;
        }

        cur += step.0;
        src_off += (cur >> rf_core::FIXED_PRECISION) as usize;
        cur &= rf_core::FIXED_FRACTION_MASK;
    }

    *cur_frac = Fixed(cur);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// P4: integer freqRatio `k`, sourceRate == destRate — output
    /// frame `i` equals input frame `floor(i*k)` and the fractional
    /// offset never drifts off zero.
    #[test]
    fn integer_ratio_samples_exact_source_frames() {
        let channels = 1;
        let src: Vec<Sample> = (0..20).map(|i| i as f32).collect();
        let step = Fixed::from_f64(2.0); // k=2: consume 2 source frames per output frame
        let mut cur = Fixed::ZERO;
        let mut dst = vec![0.0f32; 8];
        resample_linear(&src, &mut dst, channels, step, &mut cur, 8);

        for (i, &v) in dst.iter().enumerate() {
            assert_eq!(v, src[i * 2]);
        }
        assert_eq!(cur, Fixed::ZERO);
    }

    /// Scenario 3: freqRatio=0.5, frame 0 == input[0], frame 1 ==
    /// (input[0]+input[1])/2.
    #[test]
    fn half_rate_interpolates_between_adjacent_frames() {
        let channels = 1;
        let src: Vec<Sample> = vec![0.0, 10.0, 20.0, 30.0, 40.0];
        let step = Fixed::from_f64(0.5);
        let mut cur = Fixed::ZERO;
        let mut dst = vec![0.0f32; 4];
        resample_linear(&src, &mut dst, channels, step, &mut cur, 4);

        assert_eq!(dst[0], 0.0);
        assert_eq!(dst[1], 5.0);
        assert_eq!(dst[2], 10.0);
        assert_eq!(dst[3], 15.0);
    }

    #[test]
    fn pass_through_scaling_p3() {
        // freqRatio=1, sourceRate==destRate: every output frame equals
        // its matching input frame (identity resample).
        let channels = 2;
        let src: Vec<Sample> = vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let step = Fixed::ONE;
        let mut cur = Fixed::ZERO;
        let mut dst = vec![0.0f32; 4];
        resample_linear(&src, &mut dst, channels, step, &mut cur, 2);
        assert_eq!(dst, &src[..4]);
    }
}
