//! Effect interface and chain runner (spec §4.6, §6, component C6).
//!
//! Effects are shared, reference-counted trait objects — clients may
//! attach the same effect instance to more than one voice, so `AddRef`
//! /`Release` become an `Arc<Mutex<dyn Effect>>` rather than explicit
//! methods on the trait.

use std::sync::Arc;

use parking_lot::Mutex;
use rf_core::{RfError, RfResult, Sample};
use smallvec::SmallVec;

/// Format half of a `LockForProcess` call: channel count, sample rate,
/// and the max frames the effect will see before the next lock.
#[derive(Debug, Clone, Copy)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct LockParams {
    pub format: AudioFormat,
    pub max_frame_count: u32,
}

/// The buffer(s) an effect's `process` call operates on. `InPlace` is
/// used when the slot's input and output channel counts match, so the
/// chain runner can reuse a single buffer; `Separate` is used whenever
/// the channel count changes.
pub enum EffectIo<'a> {
    InPlace(&'a mut [Sample]),
    Separate {
        input: &'a [Sample],
        output: &'a mut [Sample],
    },
}

/// Required of every effect in a voice's chain (spec §6).
pub trait Effect: Send {
    /// One-time configuration at attach.
    fn initialize(&mut self, _data: &[u8]) -> RfResult<()> {
        Ok(())
    }

    /// Lock in/out formats and max frame counts for the next `process`
    /// calls. Re-locked every tick so format changes are picked up
    /// cheaply; concrete effects may no-op this.
    fn lock_for_process(&mut self, input: &LockParams, output: &LockParams) -> RfResult<()>;

    fn unlock_for_process(&mut self) {}

    /// Produce one buffer. `enabled = false` requests a bypass-with-copy.
    fn process(&mut self, io: EffectIo<'_>, frames: u32, enabled: bool) -> RfResult<()>;

    /// Affine frame-count mapping for non-1:1 effects (e.g. sample-rate
    /// converters). Identity by default.
    fn calc_input_frames(&self, output_frames: u32) -> u32 {
        output_frames
    }
    fn calc_output_frames(&self, input_frames: u32) -> u32 {
        input_frames
    }

    fn set_parameters(&mut self, _blob: &[u8]) {}
    fn get_parameters(&self, _blob: &mut [u8]) {}
}

/// One slot in a voice's effect chain (spec §3 `EffectDescriptor`).
pub struct EffectSlot {
    pub effect: Arc<Mutex<dyn Effect>>,
    pub output_channels: u16,
    pub initial_enabled: bool,
    pub parameters: Vec<u8>,
    pub dirty: bool,
    /// Computed at attach time: `true` iff this slot's input and
    /// output channel counts match.
    pub in_place: bool,
}

/// A voice's effect chain: a short, ordered sequence of effect slots
/// run in-place or alternating between two scratch buffers, never more.
#[derive(Default)]
pub struct EffectChain {
    slots: SmallVec<[EffectSlot; 4]>,
    last_failure: Option<(usize, String)>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Replace the chain. `input_channels` is the channel count feeding
    /// the first slot; each subsequent slot's `in_place` flag is
    /// derived from the channel count flowing into it.
    pub fn attach<I>(&mut self, input_channels: u16, effects: I)
    where
        I: IntoIterator<Item = (Arc<Mutex<dyn Effect>>, u16, bool)>,
    {
        self.slots.clear();
        let mut channels = input_channels;
        for (effect, output_channels, initial_enabled) in effects {
            let in_place = output_channels == channels;
            self.slots.push(EffectSlot {
                effect,
                output_channels,
                initial_enabled,
                parameters: Vec::new(),
                dirty: false,
                in_place,
            });
            channels = output_channels;
        }
    }

    pub fn detach(&mut self) {
        self.slots.clear();
    }

    /// Largest channel count `buf` must hold across the whole chain:
    /// the input channel count and every slot's output channel count.
    /// A chain that grows channels across two non-in-place slots (e.g.
    /// 1 -> 2 -> 3) still alternates only `buf`/`scratch`, but `buf`
    /// must be sized for the chain's peak, not just its entry width, or
    /// a later slot writing back into `buf` overruns it.
    pub fn peak_channels(&self, input_channels: u16) -> u16 {
        let mut peak = input_channels;
        for slot in &self.slots {
            peak = peak.max(slot.output_channels);
        }
        peak
    }

    pub fn set_parameters(&mut self, slot: usize, blob: Vec<u8>) -> RfResult<()> {
        let s = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| RfError::InvalidArgument(format!("no effect slot {slot}")))?;
        s.parameters = blob;
        s.dirty = true;
        Ok(())
    }

    /// Last effect failure observed, surfaced out-of-band (spec §7
    /// "Effect failure").
    pub fn last_failure(&self) -> Option<(usize, &str)> {
        self.last_failure.as_ref().map(|(i, m)| (*i, m.as_str()))
    }

    /// Run the chain (spec §4.6). `buf` is the voice's own working
    /// buffer (B0); `scratch` is the engine's shared effect-chain
    /// cache, grown on demand here and never shrunk. Returns `true` if
    /// the final output landed in `scratch` rather than `buf`.
    pub fn process(
        &mut self,
        buf: &mut [Sample],
        scratch: &mut Vec<Sample>,
        channels_in: u16,
        sample_rate: u32,
        frames: u32,
    ) -> bool {
        let mut src_channels = channels_in;
        let mut using_scratch = false;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let dst_channels = slot.output_channels;
            let in_len = frames as usize * src_channels as usize;
            let out_len = frames as usize * dst_channels as usize;

            if slot.dirty {
                slot.effect.lock().set_parameters(&slot.parameters);
                slot.dirty = false;
            }

            let src_lock = LockParams {
                format: AudioFormat {
                    channels: src_channels,
                    sample_rate,
                },
                max_frame_count: frames,
            };
            let dst_lock = LockParams {
                format: AudioFormat {
                    channels: dst_channels,
                    sample_rate,
                },
                max_frame_count: frames,
            };

            let lock_result = slot.effect.lock().lock_for_process(&src_lock, &dst_lock);
            if let Err(e) = lock_result {
                self.fail(i, &e, buf, scratch, using_scratch, slot.in_place, out_len);
                src_channels = dst_channels;
                if !slot.in_place {
                    using_scratch = !using_scratch;
                }
                continue;
            }

            let process_result = if slot.in_place {
                let active: &mut [Sample] = if using_scratch {
                    &mut scratch[..in_len]
                } else {
                    &mut buf[..in_len]
                };
                slot.effect
                    .lock()
                    .process(EffectIo::InPlace(active), frames, slot.initial_enabled)
            } else if using_scratch {
                slot.effect.lock().process(
                    EffectIo::Separate {
                        input: &scratch[..in_len],
                        output: &mut buf[..out_len],
                    },
                    frames,
                    slot.initial_enabled,
                )
            } else {
                if scratch.len() < out_len {
                    scratch.resize(out_len, 0.0);
                }
                slot.effect.lock().process(
                    EffectIo::Separate {
                        input: &buf[..in_len],
                        output: &mut scratch[..out_len],
                    },
                    frames,
                    slot.initial_enabled,
                )
            };

            slot.effect.lock().unlock_for_process();

            if let Err(e) = process_result {
                self.fail(i, &e, buf, scratch, using_scratch, slot.in_place, out_len);
            }

            src_channels = dst_channels;
            if !slot.in_place {
                using_scratch = !using_scratch;
            }
        }

        using_scratch
    }

    fn fail(
        &mut self,
        slot: usize,
        err: &RfError,
        buf: &mut [Sample],
        scratch: &mut Vec<Sample>,
        using_scratch: bool,
        in_place: bool,
        out_len: usize,
    ) {
        log::warn!("effect slot {slot} failed: {err}");
        self.last_failure = Some((slot, err.to_string()));
        // Best-effort continuation: feed zeroes to the next stage
        // rather than propagating the failure onto the hot path.
        let next_in_scratch = if in_place { using_scratch } else { !using_scratch };
        let target: &mut [Sample] = if next_in_scratch {
            if scratch.len() < out_len {
                scratch.resize(out_len, 0.0);
            }
            &mut scratch[..out_len]
        } else {
            &mut buf[..out_len]
        };
        target.fill(0.0);
    }
}
