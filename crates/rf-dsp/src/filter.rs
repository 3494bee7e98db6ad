//! Per-voice state-variable filter (spec §4.5, component C5).
//!
//! Chamberlin-topology SVF producing simultaneous low/high/band/notch
//! outputs from one set of difference equations. State persists across
//! ticks on the voice; applied to the resample cache in place, before
//! the effect chain (spec §4.7.1 step 4).

use rf_core::{Sample, MAX_VOICE_CHANNELS};

/// Which of the four SVF outputs a filter slot selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// SVF coefficients, recomputed whenever cutoff/Q/type change.
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    pub filter_type: FilterType,
    /// `Frequency = 2 sin(pi * cutoff / sample_rate)`.
    pub frequency: f32,
    /// `OneOverQ`, clamped to `[1/Qmax, 1.5]`.
    pub one_over_q: f32,
}

const Q_MAX: f32 = 20.0;
const ONE_OVER_Q_MIN: f32 = 1.0 / Q_MAX;
const ONE_OVER_Q_MAX: f32 = 1.5;

impl FilterParams {
    pub fn new(filter_type: FilterType, cutoff_hz: f32, q: f32, sample_rate: f32) -> Self {
        let frequency = 2.0 * (std::f32::consts::PI * cutoff_hz / sample_rate).sin();
        let one_over_q = (1.0 / q).clamp(ONE_OVER_Q_MIN, ONE_OVER_Q_MAX);
        Self {
            filter_type,
            frequency,
            one_over_q,
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            filter_type: FilterType::Lowpass,
            frequency: 1.0,
            one_over_q: 1.0,
        }
    }
}

/// Four state scalars (low, high, band, notch) per channel, up to
/// [`MAX_VOICE_CHANNELS`] channels.
#[derive(Debug, Clone, Copy)]
struct ChannelState {
    low: f32,
    band: f32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self { low: 0.0, band: 0.0 }
    }
}

/// Per-voice state-variable filter, one [`ChannelState`] per channel.
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    params: FilterParams,
    state: [ChannelState; MAX_VOICE_CHANNELS],
    channels: usize,
}

impl StateVariableFilter {
    pub fn new(channels: usize) -> Self {
        assert!(channels <= MAX_VOICE_CHANNELS);
        Self {
            params: FilterParams::default(),
            state: [ChannelState::default(); MAX_VOICE_CHANNELS],
            channels,
        }
    }

    pub fn set_params(&mut self, params: FilterParams) {
        self.params = params;
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// Zero all channel state (e.g. on voice stop/flush).
    pub fn reset(&mut self) {
        for s in &mut self.state[..self.channels] {
            *s = ChannelState::default();
        }
    }

    /// Apply the filter in place to an interleaved buffer of
    /// `frames * self.channels` samples.
    pub fn process(&mut self, buf: &mut [Sample]) {
        let f = self.params.frequency;
        let inv_q = self.params.one_over_q;
        let channels = self.channels;
        debug_assert_eq!(buf.len() % channels, 0);

        for frame in buf.chunks_exact_mut(channels) {
            for (ch, x) in frame.iter_mut().enumerate() {
                let state = &mut self.state[ch];
                let low = state.low + f * state.band;
                let high = *x - low - inv_q * state.band;
                let band = f * high + state.band;
                let notch = low + high;

                state.low = low;
                state.band = band;

                *x = match self.params.filter_type {
                    FilterType::Lowpass => low,
                    FilterType::Highpass => high,
                    FilterType::Bandpass => band,
                    FilterType::Notch => notch,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let sample_rate = 48_000.0;
        let mut filter = StateVariableFilter::new(1);
        filter.set_params(FilterParams::new(
            FilterType::Lowpass,
            500.0,
            0.707,
            sample_rate,
        ));

        // Nyquist-adjacent sine should be heavily attenuated once the
        // filter settles.
        let freq = 18_000.0;
        let mut buf: Vec<Sample> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();
        let input_peak = buf.iter().cloned().fold(0.0f32, f32::max);
        filter.process(&mut buf);
        let output_peak = buf[2048..].iter().cloned().fold(0.0f32, f32::max);
        assert!(output_peak < input_peak * 0.3);
    }

    #[test]
    fn reset_zeroes_state() {
        let mut filter = StateVariableFilter::new(2);
        filter.set_params(FilterParams::new(FilterType::Lowpass, 1000.0, 1.0, 48_000.0));
        let mut buf = vec![1.0f32; 64];
        filter.process(&mut buf);
        filter.reset();
        for s in &filter.state[..2] {
            assert_relative_eq!(s.low, 0.0);
            assert_relative_eq!(s.band, 0.0);
        }
    }
}
