//! Q32.32 fixed-point arithmetic for the resampler's phase accumulator.
//!
//! Preserved exactly as fixed-point per spec §9 ("do not substitute
//! floating-point for the phase accumulator") — accumulated error over
//! long playback would otherwise become audible.

/// Number of fractional bits in a [`Fixed`] value.
pub const FIXED_PRECISION: u32 = 32;

/// Mask selecting the fractional bits of a [`Fixed`] value.
pub const FIXED_FRACTION_MASK: u64 = (1u64 << FIXED_PRECISION) - 1;

/// `1.0` represented in Q32.32.
pub const FIXED_ONE: u64 = 1u64 << FIXED_PRECISION;

/// A Q32.32 fixed-point value: high 32 bits are the integer part, low
/// 32 bits are the fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed(pub u64);

impl Fixed {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(FIXED_ONE);

    /// Build a `Fixed` from a ratio of two sample rates and a pitch
    /// multiplier: `freq_ratio * (source_rate / dest_rate)`.
    #[inline]
    pub fn from_ratio(freq_ratio: f64, source_rate: u32, dest_rate: u32) -> Self {
        let step = freq_ratio * source_rate as f64 / dest_rate as f64;
        Self::from_f64(step)
    }

    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self((v * FIXED_ONE as f64).round() as u64)
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FIXED_ONE as f64
    }

    /// Integer (whole-sample) part.
    #[inline]
    pub fn int_part(self) -> u64 {
        self.0 >> FIXED_PRECISION
    }

    /// Fractional part, still in Q32.32 form (i.e. `0 <= frac < FIXED_ONE`).
    #[inline]
    pub fn frac_part(self) -> u64 {
        self.0 & FIXED_FRACTION_MASK
    }

    /// Fraction as a float in `[0, 1)`, used to weight the linear
    /// interpolation between `s0` and `s1`.
    #[inline]
    pub fn frac_f32(self) -> f32 {
        (self.frac_part() as f64 / FIXED_ONE as f64) as f32
    }

    #[inline]
    pub fn wrapping_add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }

    #[inline]
    pub fn is_unity(self) -> bool {
        self.0 == FIXED_ONE
    }

    /// `ceil((frames * step + cur_frac) / FIXED_ONE)`, i.e. the
    /// rounded-up-to-int number of source frames needed to produce
    /// `frames` resampled output frames given `step` and the current
    /// fractional offset. Mirrors `FAudio_INTERNAL_MixSource`'s
    /// `toDecode` computation.
    #[inline]
    pub fn frames_needed(frames: u64, step: Fixed, cur_frac: Fixed) -> u64 {
        let total = frames
            .wrapping_mul(step.0)
            .wrapping_add(cur_frac.0)
            .wrapping_add(FIXED_FRACTION_MASK);
        total >> FIXED_PRECISION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_step_is_exact() {
        let step = Fixed::from_ratio(1.0, 48_000, 48_000);
        assert!(step.is_unity());
    }

    #[test]
    fn half_rate_step_doubles_source_consumption() {
        // freqRatio = 0.5 means pitched down -> consumes half a source
        // frame per output frame.
        let step = Fixed::from_ratio(0.5, 48_000, 48_000);
        assert!((step.to_f64() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn frames_needed_rounds_up() {
        let step = Fixed::from_f64(1.5);
        // Producing 2 output frames at step 1.5 consumes 3.0 source
        // frames exactly; frames_needed should be 3, not 4.
        assert_eq!(Fixed::frames_needed(2, step, Fixed::ZERO), 3);
        // Any residual fraction left over from a prior tick pushes the
        // ceiling up by one whole frame.
        let cur = Fixed(1);
        assert_eq!(Fixed::frames_needed(2, step, cur), 4);
    }
}
