//! Engine tick (spec §4.8, component C8): the single per-period entry
//! point the platform layer calls to produce one buffer of output.

use rf_core::{clamp_volume, EngineConfig, RfError, RfResult, Sample};

use crate::graph::VoiceGraph;
use crate::mixer::{self, NoPassEvents};
use crate::voice::{SourceVoice, SubmixVoice};

/// A scratch buffer grown on demand and never shrunk (spec §3, §5:
/// "owned exclusively by the mixer thread during the tick").
#[derive(Default)]
pub struct GrowCache {
    pub buf: Vec<Sample>,
}

impl GrowCache {
    pub fn ensure(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0.0);
        }
    }
}

/// The three grow-only caches shared by every voice update within a
/// single tick (spec §3 "Engine" scratch caches).
#[derive(Default)]
pub struct EngineCaches {
    pub decode_cache: GrowCache,
    pub resample_cache: GrowCache,
    pub effect_cache: GrowCache,
}

/// Engine-lifetime callbacks (spec §4.8 steps 2 and 7).
pub trait EngineEvents: Send {
    fn on_processing_pass_start(&mut self) {}
    fn on_processing_pass_end(&mut self) {}
}

/// Singleton per audio instance (spec §3 "Engine").
pub struct Engine {
    pub config: EngineConfig,
    pub graph: VoiceGraph,
    caches: EngineCaches,
    callbacks: Vec<Box<dyn EngineEvents>>,
    active: bool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let graph = VoiceGraph::new(config.master_channels, config.master_sample_rate);
        Self {
            config,
            graph,
            caches: EngineCaches::default(),
            callbacks: Vec::new(),
            active: true,
        }
    }

    pub fn register_callback(&mut self, cb: Box<dyn EngineEvents>) {
        self.callbacks.push(cb);
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Produce one period of `updateSize * masterChannels` float32 frames
/// into `out` (spec §6 "Engine tick contract", §4.8). `out` must be
/// exactly `engine.config.update_size * engine.config.master_channels`
/// samples long.
pub fn update_engine(engine: &mut Engine, out: &mut [Sample]) -> RfResult<()> {
    let frames = engine.config.update_size;
    let master_channels = engine.config.master_channels as usize;
    let expected = frames as usize * master_channels;
    if out.len() != expected {
        return Err(RfError::InvalidArgument(format!(
            "output buffer must hold exactly {expected} samples, got {}",
            out.len()
        )));
    }

    if !engine.active {
        return Ok(());
    }

    for cb in engine.callbacks.iter_mut() {
        cb.on_processing_pass_start();
    }

    {
        let master = engine.graph.master();
        let mut master = master.lock();
        master.ensure_accum(frames as usize);
        master.clear_accum();
    }

    let default_output_rate = engine.config.master_sample_rate;
    for id in engine.graph.source_ids() {
        let Some(voice) = engine.graph.source(id) else {
            continue;
        };
        let mut voice = voice.lock();
        if let Err(e) = update_one_source(&mut voice, &engine.graph, &mut engine.caches, frames, default_output_rate) {
            log::warn!("source voice {id:?} update failed: {e}");
        }
    }

    for stage in 0..=engine.graph.max_submix_stage() {
        for id in engine.graph.submix_ids_at_stage(stage) {
            let Some(voice) = engine.graph.submix(id) else {
                continue;
            };
            let mut voice = voice.lock();
            if let Err(e) = update_one_submix(&mut voice, &engine.graph, &mut engine.caches, frames) {
                log::warn!("submix voice {id:?} update failed: {e}");
            }
        }
    }

    master_finalize(&engine.graph, &mut engine.caches, frames, out)?;

    for cb in engine.callbacks.iter_mut() {
        cb.on_processing_pass_end();
    }

    Ok(())
}

fn update_one_source(
    voice: &mut SourceVoice,
    graph: &VoiceGraph,
    caches: &mut EngineCaches,
    frames: u32,
    default_output_rate: u32,
) -> RfResult<()> {
    // Pull the voice's own callback sinks out (a self-referential
    // borrow can't be split otherwise), run the update, and restore
    // them afterward.
    let mut queue_events = std::mem::replace(&mut voice.queue_events, Box::new(rf_audio::NoEvents));
    let mut pass_events = std::mem::replace(&mut voice.pass_events, Box::new(NoPassEvents));
    let result = mixer::source_update(
        voice,
        graph,
        caches,
        frames,
        default_output_rate,
        queue_events.as_mut(),
        pass_events.as_mut(),
    );
    voice.queue_events = queue_events;
    voice.pass_events = pass_events;
    result
}

fn update_one_submix(voice: &mut SubmixVoice, graph: &VoiceGraph, caches: &mut EngineCaches, frames: u32) -> RfResult<()> {
    mixer::submix_update(voice, graph, caches, frames)
}

/// Spec §4.7.3: multiply by master volume with clamp, run the master
/// effect chain, and copy the final buffer into the caller's `out`.
fn master_finalize(graph: &VoiceGraph, caches: &mut EngineCaches, frames: u32, out: &mut [Sample]) -> RfResult<()> {
    let master = graph.master();
    let mut master = master.lock();
    let channels = master.common.output_channels as usize;
    let len = frames as usize * channels;

    for s in master.accum[..len].iter_mut() {
        *s = clamp_volume(*s * master.common.volume);
    }

    if let Some(filter) = &mut master.common.filter {
        filter.process(&mut master.accum[..len]);
    }

    let peak_channels = master.common.effects.peak_channels(master.common.output_channels) as usize;
    let peak_len = (frames as usize * peak_channels).max(len);
    caches.resample_cache.ensure(peak_len);
    caches.resample_cache.buf[..len].copy_from_slice(&master.accum[..len]);

    let used_scratch = master.common.effects.process(
        &mut caches.resample_cache.buf[..peak_len],
        &mut caches.effect_cache.buf,
        master.common.output_channels,
        master.sample_rate,
        frames,
    );

    if used_scratch {
        out.copy_from_slice(&caches.effect_cache.buf[..len]);
    } else {
        out.copy_from_slice(&caches.resample_cache.buf[..len]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use rf_audio::QueueEvents;
    use rf_core::{AudioBuffer, VoiceConfig, VoiceId, WaveFormat};

    use super::*;
    use crate::voice::{Send, SourceVoice};

    fn config(update_size: u32, channels: u16, rate: u32) -> EngineConfig {
        EngineConfig {
            update_size,
            master_sample_rate: rate,
            master_channels: channels,
            ..Default::default()
        }
    }

    /// Scenario 1: master with no sources produces a full period of
    /// silence.
    #[test]
    fn silent_tick_is_all_zero() {
        let mut engine = Engine::new(config(480, 2, 48_000));
        let mut out = vec![1.0f32; 480 * 2];
        update_engine(&mut engine, &mut out).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }

    /// Scenario 2: one PCM16 stereo buffer, unity rate/pitch, identity
    /// send matrix — output equals input scaled by 1/32768.
    #[test]
    fn pass_through_source_scales_by_inverse_32768() {
        let mut engine = Engine::new(config(480, 2, 48_000));
        let format = WaveFormat::pcm16(2, 48_000);
        let mut voice = SourceVoice::new(format, 2, VoiceConfig::default());
        voice.common.add_send(Send::with_default_matrix(VoiceId::MASTER, 2, 2));
        voice.start().unwrap();

        let samples: Vec<i16> = (0..480 * 2).map(|i| ((i % 2000) as i16).wrapping_mul(11)).collect();
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in &samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let buffer = AudioBuffer::new(Arc::from(bytes.into_boxed_slice()), 0, 480).end_of_stream();
        voice.queue.submit(buffer).unwrap();
        engine.graph.add_source(voice);

        let mut out = vec![0.0f32; 480 * 2];
        update_engine(&mut engine, &mut out).unwrap();

        for (i, &s) in samples.iter().enumerate() {
            let expected = s as f32 / 32768.0;
            assert!((out[i] - expected).abs() < 1e-6, "sample {i}: {} vs {expected}", out[i]);
        }
    }

    /// §7 kind 4: once the queue runs out mid-tick, the rest of that
    /// tick must be silence — not whatever stale, larger-tick data is
    /// still sitting in the decode cache past the padding region. Tick
    /// one fully occupies a 100-frame decode cache with real nonzero
    /// data; tick two only has 50 frames left in the queue, leaving the
    /// cache's tail (indices 66..100) holding tick one's leftover
    /// values. Sizing the resample off the requested frame count
    /// instead of the actually-decoded count would leak that leftover
    /// data into the output.
    #[test]
    fn queue_underrun_mid_tick_produces_silence_not_stale_cache_data() {
        let mut engine = Engine::new(config(100, 1, 48_000));
        let format = WaveFormat::pcm32f(1, 48_000);
        let mut voice = SourceVoice::new(format, 1, VoiceConfig::default());
        voice.common.add_send(Send::with_default_matrix(VoiceId::MASTER, 1, 1));
        voice.start().unwrap();

        let samples: Vec<f32> = (0..150).map(|i| (i + 1) as f32).collect();
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for s in &samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let buffer = AudioBuffer::new(Arc::from(bytes.into_boxed_slice()), 0, 150).end_of_stream();
        voice.queue.submit(buffer).unwrap();
        engine.graph.add_source(voice);

        let mut out = vec![0.0f32; 100];
        update_engine(&mut engine, &mut out).unwrap();
        for (i, &s) in samples[..100].iter().enumerate() {
            assert!((out[i] - s).abs() < 1e-6, "tick 1 sample {i}: {} vs {s}", out[i]);
        }

        let mut out = vec![0.0f32; 100];
        update_engine(&mut engine, &mut out).unwrap();
        for (i, &s) in samples[100..150].iter().enumerate() {
            assert!((out[i] - s).abs() < 1e-6, "tick 2 sample {i}: {} vs {s}", out[i]);
        }
        assert!(
            out[50..].iter().all(|&s| s == 0.0),
            "tick 2 tail past the drained queue must be silence, got {:?}",
            &out[50..]
        );
    }

    /// Scenario 5: PlayLength=100, LoopBegin=50, LoopLength=50,
    /// LoopCount=2 fires OnLoopEnd twice and OnBufferEnd once over
    /// enough ticks to drain the buffer (250 frames total).
    #[test]
    fn looped_buffer_fires_loop_and_buffer_end_callbacks() {
        struct Counters {
            loop_ends: Arc<AtomicU32>,
            buffer_ends: Arc<AtomicU32>,
        }
        impl QueueEvents for Counters {
            fn on_loop_end(&mut self, _context: Option<u64>) {
                self.loop_ends.fetch_add(1, Ordering::SeqCst);
            }
            fn on_buffer_end(&mut self, _context: Option<u64>) {
                self.buffer_ends.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut engine = Engine::new(config(50, 1, 48_000));
        let format = WaveFormat::pcm32f(1, 48_000);
        let mut voice = SourceVoice::new(format, 1, VoiceConfig::default());
        voice.common.add_send(Send::with_default_matrix(VoiceId::MASTER, 1, 1));
        voice.start().unwrap();

        let loop_ends = Arc::new(AtomicU32::new(0));
        let buffer_ends = Arc::new(AtomicU32::new(0));
        voice.set_events(
            Box::new(Counters {
                loop_ends: Arc::clone(&loop_ends),
                buffer_ends: Arc::clone(&buffer_ends),
            }),
            Box::new(crate::mixer::NoPassEvents),
        );

        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for s in &samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let buffer = AudioBuffer::new(Arc::from(bytes.into_boxed_slice()), 0, 100)
            .with_loop(50, 50, 2)
            .end_of_stream();
        voice.queue.submit(buffer).unwrap();
        engine.graph.add_source(voice);

        let mut out = vec![0.0f32; 50];
        for _ in 0..8 {
            update_engine(&mut engine, &mut out).unwrap();
        }

        assert_eq!(loop_ends.load(Ordering::SeqCst), 2);
        assert_eq!(buffer_ends.load(Ordering::SeqCst), 1);
    }
}
