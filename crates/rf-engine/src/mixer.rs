//! Source and submix voice update (spec §4.7, component C7).

use rf_audio::QueueEvents;
use rf_core::{clamp_volume, Fixed, RfResult, FIXED_ONE};

use crate::engine::EngineCaches;
use crate::graph::VoiceGraph;
use crate::voice::{SourceVoice, SubmixVoice};

/// Processing-pass lifecycle hooks (spec §3 "optional callback set":
/// pass-start, pass-end). Kept separate from [`QueueEvents`] rather
/// than as a supertrait so both can be passed as plain trait objects
/// without relying on trait-object upcasting.
pub trait PassEvents: Send {
    fn on_voice_processing_pass_start(&mut self, _bytes_wanted: u32) {}
    fn on_voice_processing_pass_end(&mut self) {}
}

/// No-op implementation for voices with no client callbacks registered.
pub struct NoPassEvents;
impl PassEvents for NoPassEvents {}

/// Update one active source voice for `frames` output frames (spec
/// §4.7.1). `default_output_rate` is used when the voice currently has
/// no sends (nothing to derive a destination rate from) so the
/// resample step stays deterministic tick-to-tick.
pub fn source_update(
    voice: &mut SourceVoice,
    graph: &VoiceGraph,
    caches: &mut EngineCaches,
    frames: u32,
    default_output_rate: u32,
    queue_events: &mut dyn QueueEvents,
    pass_events: &mut dyn PassEvents,
) -> RfResult<()> {
    if !voice.active {
        return Ok(());
    }

    let channels_in = voice.format.channels as usize;
    let out_ch = voice.common.output_channels as usize;

    let output_rate = voice
        .common
        .sends
        .first()
        .and_then(|s| graph.destination_rate(s.destination))
        .unwrap_or(default_output_rate);
    voice.refresh_resample_step(output_rate);

    pass_events.on_voice_processing_pass_start(frames.saturating_mul(2));

    caches.resample_cache.ensure(frames as usize * channels_in);
    let mut produced: u64 = 0;

    while produced < frames as u64 && !voice.queue.is_empty() {
        let remaining = frames as u64 - produced;
        let to_decode = Fixed::frames_needed(remaining, voice.resample_step, voice.frac_offset);
        if to_decode == 0 {
            break;
        }

        caches
            .decode_cache
            .ensure((to_decode as usize + rf_core::EXTRA_DECODE_PADDING) * channels_in);

        let decoded = voice.queue.decode_buffers(
            &voice.format,
            to_decode,
            &mut caches.decode_cache.buf,
            &mut voice.frac_offset,
            queue_events,
        )?;

        // Size the resample from the frames `decode_buffers` actually
        // wrote, not the count requested: a short final buffer or a
        // mid-tick underrun means `decoded < to_decode`, and the cache
        // only holds `decoded` real frames plus zero padding past that
        // (spec §7 kind 4 — underrun must contribute silence, not
        // whatever stale data follows the padding).
        let to_resample_by_data = if voice.resample_step.0 == 0 {
            0
        } else {
            let avail = (decoded << rf_core::FIXED_PRECISION).saturating_sub(voice.frac_offset.0);
            avail / voice.resample_step.0
        };
        let to_resample = remaining.min(to_resample_by_data);
        if to_resample == 0 {
            // Nothing more can be produced from what was decoded this
            // pass (queue underrun, spec §7 kind 4): leave the rest of
            // the tick silent for this voice rather than spinning.
            break;
        }

        let dst_start = produced as usize * channels_in;
        if voice.resample_step.0 == FIXED_ONE {
            let n = to_resample as usize * channels_in;
            caches.resample_cache.buf[dst_start..dst_start + n]
                .copy_from_slice(&caches.decode_cache.buf[..n]);
        } else {
            rf_audio::resample_linear(
                &caches.decode_cache.buf,
                &mut caches.resample_cache.buf[dst_start..],
                channels_in,
                voice.resample_step,
                &mut voice.frac_offset,
                to_resample,
            );
        }

        if decoded == 0 {
            break;
        }
        produced += to_resample;
    }

    // Queue underrun / empty queue: silence the undecoded tail.
    let produced_samples = produced as usize * channels_in;
    let total_samples = frames as usize * channels_in;
    if produced_samples < total_samples {
        caches.resample_cache.buf[produced_samples..total_samples].fill(0.0);
    }

    if let Some(filter) = &mut voice.common.filter {
        filter.process(&mut caches.resample_cache.buf[..total_samples]);
    }

    let effect_input_channels = voice.format.channels;
    // The chain's B0 must hold its peak channel count, not just the
    // count entering it: a slot that grows channels and writes back
    // into `buf` on a later, non-in-place stage would otherwise overrun
    // a buffer only sized for `channels_in`.
    let peak_channels = voice.common.effects.peak_channels(effect_input_channels) as usize;
    let peak_len = frames as usize * peak_channels;
    caches.resample_cache.ensure(peak_len);
    let used_scratch = voice.common.effects.process(
        &mut caches.resample_cache.buf[..peak_len.max(total_samples)],
        &mut caches.effect_cache.buf,
        effect_input_channels,
        output_rate,
        frames,
    );

    let mix_len = frames as usize * out_ch;
    let effect_out: &[rf_core::Sample] = if used_scratch {
        &caches.effect_cache.buf[..mix_len]
    } else {
        &caches.resample_cache.buf[..mix_len]
    };

    for send in &voice.common.sends {
        let matrix = &send.matrix;
        graph.mix_into(send.destination, frames as usize, |dst, dst_channels| {
            let d_ch = dst_channels as usize;
            for j in 0..frames as usize {
                for co in 0..d_ch {
                    let mut acc = dst[j * d_ch + co];
                    for ci in 0..out_ch {
                        acc += effect_out[j * out_ch + ci]
                            * voice.common.channel_volume[ci]
                            * voice.common.volume
                            * matrix[co * out_ch + ci];
                    }
                    dst[j * d_ch + co] = clamp_volume(acc);
                }
            }
        })?;
    }

    pass_events.on_voice_processing_pass_end();
    Ok(())
}

/// Update one submix voice for `frames` output frames (spec §4.7.2).
/// Volume is applied to the input cache directly, before the filter
/// and effect chain — the ordering the spec calls mandatory.
pub fn submix_update(voice: &mut SubmixVoice, graph: &VoiceGraph, caches: &mut EngineCaches, frames: u32) -> RfResult<()> {
    voice.ensure_input_cache(frames as usize);
    let in_ch = voice.input_channels as usize;
    let out_ch = voice.common.output_channels as usize;
    let total_in = frames as usize * in_ch;

    caches.resample_cache.ensure(frames as usize * out_ch.max(in_ch));
    // The submix input resampler is pluggable and, absent a configured
    // rate change, an identity copy (spec §1 non-goals: no additional
    // resampling algorithm beyond linear-at-sources is in scope here).
    caches.resample_cache.buf[..total_in].copy_from_slice(&voice.input_cache[..total_in]);

    for s in caches.resample_cache.buf[..total_in].iter_mut() {
        *s *= voice.common.volume;
    }

    if let Some(filter) = &mut voice.common.filter {
        filter.process(&mut caches.resample_cache.buf[..total_in]);
    }

    let peak_channels = voice.common.effects.peak_channels(voice.input_channels) as usize;
    let peak_len = frames as usize * peak_channels;
    caches.resample_cache.ensure(peak_len);
    let used_scratch = voice.common.effects.process(
        &mut caches.resample_cache.buf[..peak_len.max(total_in)],
        &mut caches.effect_cache.buf,
        voice.input_channels,
        voice.input_rate,
        frames,
    );

    let mix_len = frames as usize * out_ch;
    let effect_out: &[rf_core::Sample] = if used_scratch {
        &caches.effect_cache.buf[..mix_len]
    } else {
        &caches.resample_cache.buf[..mix_len]
    };

    for send in &voice.common.sends {
        let matrix = &send.matrix;
        graph.mix_into(send.destination, frames as usize, |dst, dst_channels| {
            let d_ch = dst_channels as usize;
            for j in 0..frames as usize {
                for co in 0..d_ch {
                    let mut acc = dst[j * d_ch + co];
                    for ci in 0..out_ch {
                        acc += effect_out[j * out_ch + ci] * voice.common.channel_volume[ci] * matrix[co * out_ch + ci];
                    }
                    dst[j * d_ch + co] = clamp_volume(acc);
                }
            }
        })?;
    }

    voice.clear_input_cache();
    Ok(())
}
