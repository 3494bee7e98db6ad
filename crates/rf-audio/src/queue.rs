//! Per-source buffer queue state machine (spec §4.3, component C3).
//!
//! The queue owns the FIFO of client-submitted [`AudioBuffer`]s and the
//! head buffer's read cursor. [`SourceQueue::decode_buffers`] is the
//! "decode-buffers subroutine" from spec §4.7.1: it walks the queue,
//! decoding up to `to_decode` frames and following loop/end-of-buffer
//! transitions, then zero-pads [`EXTRA_DECODE_PADDING`] extra frames so
//! the resampler's `s1` lookup never reads past decoded data.

use std::collections::VecDeque;

use rf_core::{AudioBuffer, BufferQueueEntry, Fixed, RfResult, Sample, WaveFormat, EXTRA_DECODE_PADDING};

use crate::decode;

/// Completion callbacks a source voice may register (spec §3: "optional
/// callback set"). All methods default to no-ops so callers only
/// implement what they use.
pub trait QueueEvents {
    fn on_buffer_start(&mut self, _context: Option<u64>) {}
    fn on_buffer_end(&mut self, _context: Option<u64>) {}
    fn on_loop_end(&mut self, _context: Option<u64>) {}
    fn on_stream_end(&mut self) {}
}

/// No-op event sink, useful for tests and headless decode calls.
pub struct NoEvents;
impl QueueEvents for NoEvents {}

/// FIFO of buffers queued on a source voice, plus the head buffer's
/// read cursor (spec §3, §4.3).
#[derive(Default)]
pub struct SourceQueue {
    entries: VecDeque<BufferQueueEntry>,
    /// Frame offset within the head buffer (`voice.src.curBufferOffset`).
    pub cur_offset: u32,
    /// Running count of frames read from the head buffer; reset to 0
    /// when an END_OF_STREAM buffer completes.
    pub total_samples: u64,
}

impl SourceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn head(&self) -> Option<&AudioBuffer> {
        self.entries.front().map(|e| &e.buffer)
    }

    /// Append a buffer to the queue (spec §4.3 `submit`).
    pub fn submit(&mut self, buffer: AudioBuffer) -> RfResult<()> {
        if let Some(back) = self.entries.back() {
            if back.buffer.is_end_of_stream() {
                return Err(rf_core::RfError::InvalidState(
                    "cannot submit a buffer after an end-of-stream buffer".into(),
                ));
            }
        } else {
            self.cur_offset = buffer.play_begin;
        }
        self.entries.push_back(BufferQueueEntry::new(buffer));
        Ok(())
    }

    /// Clear pending buffers but keep the currently-playing head (spec
    /// §4.3 `flush`).
    pub fn flush(&mut self) {
        self.entries.truncate(1);
    }

    /// Like [`Self::flush`], but if the head buffer is mid-loop, stop it
    /// from looping again once its current pass ends (spec §4.3
    /// `flushAtLoopPoint`).
    pub fn flush_at_loop_point(&mut self) {
        self.entries.truncate(1);
        if let Some(entry) = self.entries.front_mut() {
            if entry.buffer.is_looping() {
                entry.buffer.loop_count = 0;
            }
        }
    }

    /// Decode up to `to_decode` frames into `decode_cache`, following
    /// buffer/loop/stream transitions, then append
    /// [`EXTRA_DECODE_PADDING`] zero-filled (or real, if available)
    /// frames. Returns the number of frames actually decoded before
    /// padding. `decode_cache` must have room for
    /// `(to_decode + EXTRA_DECODE_PADDING) * format.channels` samples.
    pub fn decode_buffers(
        &mut self,
        format: &WaveFormat,
        to_decode: u64,
        decode_cache: &mut [Sample],
        frac_offset: &mut Fixed,
        events: &mut dyn QueueEvents,
    ) -> RfResult<u64> {
        let channels = format.channels as usize;
        let mut decoded: u64 = 0;

        while decoded < to_decode && !self.entries.is_empty() {
            let decoding = (to_decode - decoded) as u32;

            let play_begin = self.entries.front().unwrap().buffer.play_begin;
            let end = self.entries.front().unwrap().buffer.region_end();

            if self.cur_offset == play_begin {
                let context = self.entries.front().unwrap().buffer.context;
                events.on_buffer_start(context);
            }

            let end_read = (end - self.cur_offset).min(decoding);

            decode::decode(
                &self.entries.front().unwrap().buffer,
                format,
                self.cur_offset,
                &mut decode_cache[decoded as usize * channels..],
                end_read,
            )?;

            self.cur_offset += end_read;
            self.total_samples += end_read as u64;

            if end_read < decoding {
                let is_looping = self.entries.front().unwrap().buffer.is_looping();
                if is_looping {
                    let loop_begin = self.entries.front().unwrap().buffer.loop_begin;
                    self.cur_offset = loop_begin;
                    let entry = self.entries.front_mut().unwrap();
                    if !entry.buffer.is_infinite_loop() {
                        entry.buffer.loop_count -= 1;
                    }
                    let context = entry.buffer.context;
                    events.on_loop_end(context);
                } else {
                    if self.entries.front().unwrap().buffer.is_end_of_stream() {
                        *frac_offset = Fixed::ZERO;
                        self.total_samples = 0;
                    }
                    let removed = self.entries.pop_front().unwrap();
                    if let Some(next) = self.entries.front() {
                        self.cur_offset = next.buffer.play_begin;
                    }
                    events.on_buffer_end(removed.buffer.context);
                    if removed.buffer.is_end_of_stream() {
                        events.on_stream_end();
                    }
                }
            }

            decoded += end_read as u64;
        }

        let pad_start = decoded as usize * channels;
        if let Some(entry) = self.entries.front() {
            let end = entry.buffer.region_end();
            let end_read = (end - self.cur_offset).min(EXTRA_DECODE_PADDING as u32);
            decode::decode(
                &entry.buffer,
                format,
                self.cur_offset,
                &mut decode_cache[pad_start..],
                end_read,
            )?;
            if end_read < EXTRA_DECODE_PADDING as u32 {
                // Corrected precedence (spec §9 Open Question): the
                // subtraction must happen before the channel multiply,
                // or the zero-fill undershoots whenever nChannels > 1.
                let zero_count = (EXTRA_DECODE_PADDING as u32 - end_read) as usize * channels;
                let written = end_read as usize * channels;
                decode_cache[pad_start + written..pad_start + written + zero_count].fill(0.0);
            }
        } else {
            let zero_count = EXTRA_DECODE_PADDING * channels;
            decode_cache[pad_start..pad_start + zero_count].fill(0.0);
        }

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{WaveFormat, LOOP_INFINITE};
    use std::sync::Arc;

    fn pcm32f_buffer(samples: &[f32], loop_begin: u32, loop_length: u32, loop_count: u32) -> AudioBuffer {
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        AudioBuffer::new(Arc::from(bytes.into_boxed_slice()), 0, samples.len() as u32)
            .with_loop(loop_begin, loop_length, loop_count)
    }

    /// Regression test for the spec §9 Open Question: the zero-fill
    /// after a truncated read must be `(EXTRA_DECODE_PADDING - endRead)
    /// * nChannels`, not `EXTRA_DECODE_PADDING - endRead * nChannels`.
    #[test]
    fn decode_padding_precedence() {
        let format = WaveFormat::pcm32f(2, 48_000);
        let samples = [1.0f32, 2.0, 3.0, 4.0]; // 2 stereo frames
        let buffer = pcm32f_buffer(&samples, 0, 0, 0).end_of_stream();
        let mut queue = SourceQueue::new();
        queue.submit(buffer).unwrap();

        let mut cache = vec![9.0f32; (2 + EXTRA_DECODE_PADDING) * 2];
        let mut frac = Fixed::ZERO;
        let decoded = queue
            .decode_buffers(&format, 2, &mut cache, &mut frac, &mut NoEvents)
            .unwrap();
        assert_eq!(decoded, 2);

        // endRead for the padding pass is 0 (buffer exhausted), so all
        // EXTRA_DECODE_PADDING * 2 trailing samples must be zero, not
        // merely (EXTRA_DECODE_PADDING - 0 * 2) which the buggy
        // precedence would also compute as EXTRA_DECODE_PADDING here —
        // the bug only bites when endRead > 0; assert the full region
        // regardless.
        let pad_region = &cache[4..4 + EXTRA_DECODE_PADDING * 2];
        assert!(pad_region.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn loop_count_frame_arithmetic_p6() {
        // PlayLength=100, LoopBegin=0, LoopLength=50, LoopCount=2:
        // expect PlayLength + C*L = 100 + 2*50 = 200 frames before the
        // buffer completes.
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let buffer = pcm32f_buffer(&samples, 0, 50, 2);
        let mut queue = SourceQueue::new();
        queue.submit(buffer).unwrap();

        let format = WaveFormat::pcm32f(1, 48_000);
        let mut frac = Fixed::ZERO;
        let mut total = 0u64;
        let mut loop_ends = 0u32;

        struct Counter<'a>(&'a mut u32);
        impl QueueEvents for Counter<'_> {
            fn on_loop_end(&mut self, _context: Option<u64>) {
                *self.0 += 1;
            }
        }

        let mut cache = vec![0.0f32; (10 + EXTRA_DECODE_PADDING)];
        while !queue.is_empty() && total < 300 {
            let mut counter = Counter(&mut loop_ends);
            let decoded = queue
                .decode_buffers(&format, 10, &mut cache, &mut frac, &mut counter)
                .unwrap();
            total += decoded;
        }

        assert_eq!(total, 200);
        assert_eq!(loop_ends, 2);
    }

    #[test]
    fn infinite_loop_never_advances_past_buffer() {
        let samples: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let buffer = pcm32f_buffer(&samples, 0, 20, LOOP_INFINITE);
        let mut queue = SourceQueue::new();
        queue.submit(buffer).unwrap();

        let format = WaveFormat::pcm32f(1, 48_000);
        let mut frac = Fixed::ZERO;
        let mut cache = vec![0.0f32; 20 + EXTRA_DECODE_PADDING];
        for _ in 0..5 {
            queue
                .decode_buffers(&format, 20, &mut cache, &mut frac, &mut NoEvents)
                .unwrap();
            assert_eq!(queue.len(), 1, "infinite loop must never pop its buffer");
        }
    }
}
