//! Sample format decoders (spec §4.2, component C2).
//!
//! Every decoder has the shape `decode(buffer, start_frame, dst, frames,
//! format)` and writes `frames * channels` floats to `dst`. PCM32F is a
//! straight copy; PCM8/PCM16 go through the [`rf_dsp::simd`] converters;
//! MSADPCM is block-based and supports starting mid-block.

use rf_core::{AudioBuffer, FormatTag, RfError, RfResult, Sample, WaveFormat};

/// Decode `frames` frames starting at `start_frame` (in frames, not
/// bytes) of `buffer` into `dst`, which must hold at least
/// `frames * format.channels` samples.
pub fn decode(
    buffer: &AudioBuffer,
    format: &WaveFormat,
    start_frame: u32,
    dst: &mut [Sample],
    frames: u32,
) -> RfResult<()> {
    let channels = format.channels as usize;
    let need = frames as usize * channels;
    if dst.len() < need {
        return Err(RfError::InvalidArgument(format!(
            "decode dst too small: need {need}, have {}",
            dst.len()
        )));
    }
    match format.tag {
        FormatTag::Pcm8 => decode_pcm8(buffer, start_frame, dst, frames, channels),
        FormatTag::Pcm16 => decode_pcm16(buffer, start_frame, dst, frames, channels),
        FormatTag::Pcm32Float => decode_pcm32f(buffer, start_frame, dst, frames, channels),
        FormatTag::AdpcmMono => decode_msadpcm_mono(buffer, format, start_frame, dst, frames),
        FormatTag::AdpcmStereo => decode_msadpcm_stereo(buffer, format, start_frame, dst, frames),
    }
}

fn decode_pcm8(
    buffer: &AudioBuffer,
    start_frame: u32,
    dst: &mut [Sample],
    frames: u32,
    channels: usize,
) -> RfResult<()> {
    let start = start_frame as usize * channels;
    let count = frames as usize * channels;
    let src = &buffer.data[start..start + count];
    rf_dsp::convert_u8_to_f32(src, &mut dst[..count]);
    Ok(())
}

fn decode_pcm16(
    buffer: &AudioBuffer,
    start_frame: u32,
    dst: &mut [Sample],
    frames: u32,
    channels: usize,
) -> RfResult<()> {
    let start = start_frame as usize * channels * 2;
    let count = frames as usize * channels;
    let bytes = &buffer.data[start..start + count * 2];
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    rf_dsp::convert_s16_to_f32(&samples, &mut dst[..count]);
    Ok(())
}

fn decode_pcm32f(
    buffer: &AudioBuffer,
    start_frame: u32,
    dst: &mut [Sample],
    frames: u32,
    channels: usize,
) -> RfResult<()> {
    let start = start_frame as usize * channels * 4;
    let count = frames as usize * channels;
    let bytes = &buffer.data[start..start + count * 4];
    for (o, b) in dst[..count].iter_mut().zip(bytes.chunks_exact(4)) {
        *o = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    }
    Ok(())
}

// ============ MSADPCM (spec §4.2) ============

const ADAPTION_TABLE: [i32; 16] = [
    230, 230, 230, 230, 307, 409, 512, 614, 768, 614, 512, 409, 307, 230, 230, 230,
];
const ADAPT_COEFF_1: [i32; 7] = [256, 512, 0, 192, 240, 460, 392];
const ADAPT_COEFF_2: [i32; 7] = [0, -256, 0, 64, 0, -208, -232];

struct NibbleState {
    predictor: u8,
    delta: i16,
    sample1: i16,
    sample2: i16,
}

fn parse_nibble(nibble: u8, state: &mut NibbleState) -> i16 {
    let mut signed_nibble = nibble as i8;
    if signed_nibble & 0x08 != 0 {
        signed_nibble -= 0x10;
    }

    let coeff1 = ADAPT_COEFF_1[state.predictor as usize];
    let coeff2 = ADAPT_COEFF_2[state.predictor as usize];
    let mut sample_int =
        (state.sample1 as i32 * coeff1 + state.sample2 as i32 * coeff2) / 256;
    sample_int += signed_nibble as i32 * state.delta as i32;
    let sample = sample_int.clamp(-32768, 32767) as i16;

    state.sample2 = state.sample1;
    state.sample1 = sample;
    state.delta = ((ADAPTION_TABLE[nibble as usize] * state.delta as i32) / 256) as i16;
    if state.delta < 16 {
        state.delta = 16;
    }
    sample
}

/// Decode one mono MSADPCM block (preamble + nibbles) into `block_cache`,
/// which must hold `bsize` i16 samples. Returns the number of input
/// bytes consumed.
fn decode_mono_block(buf: &[u8], block_cache: &mut [i16], block_align: u32) -> usize {
    let predictor = buf[0];
    let mut state = NibbleState {
        predictor,
        delta: i16::from_le_bytes([buf[1], buf[2]]),
        sample1: i16::from_le_bytes([buf[3], buf[4]]),
        sample2: i16::from_le_bytes([buf[5], buf[6]]),
    };
    block_cache[0] = state.sample2;
    block_cache[1] = state.sample1;

    let nibble_bytes = block_align - 7;
    let mut out = 2usize;
    for i in 0..nibble_bytes {
        let byte = buf[7 + i as usize];
        block_cache[out] = parse_nibble(byte >> 4, &mut state);
        block_cache[out + 1] = parse_nibble(byte & 0x0F, &mut state);
        out += 2;
    }
    7 + nibble_bytes as usize
}

fn decode_stereo_block(buf: &[u8], block_cache: &mut [i16], block_align: u32) -> usize {
    let mut left = NibbleState {
        predictor: buf[0],
        delta: i16::from_le_bytes([buf[2], buf[3]]),
        sample1: i16::from_le_bytes([buf[6], buf[7]]),
        sample2: i16::from_le_bytes([buf[10], buf[11]]),
    };
    let mut right = NibbleState {
        predictor: buf[1],
        delta: i16::from_le_bytes([buf[4], buf[5]]),
        sample1: i16::from_le_bytes([buf[8], buf[9]]),
        sample2: i16::from_le_bytes([buf[12], buf[13]]),
    };

    block_cache[0] = left.sample2;
    block_cache[1] = right.sample2;
    block_cache[2] = left.sample1;
    block_cache[3] = right.sample1;

    let nibble_bytes = block_align - 14;
    let mut out = 4usize;
    for i in 0..nibble_bytes {
        let byte = buf[14 + i as usize];
        block_cache[out] = parse_nibble(byte >> 4, &mut left);
        block_cache[out + 1] = parse_nibble(byte & 0x0F, &mut right);
        out += 2;
    }
    14 + nibble_bytes as usize
}

fn decode_msadpcm_mono(
    buffer: &AudioBuffer,
    format: &WaveFormat,
    start_frame: u32,
    dst: &mut [Sample],
    frames: u32,
) -> RfResult<()> {
    let bsize = format.adpcm_block_frames() as u32;
    let block_align = format.block_align as u32;
    let mut block_cache = [0i16; 512];

    let mut block_index = start_frame / bsize;
    let mut mid_offset = (start_frame % bsize) as usize;
    let mut remaining = frames as usize;
    let mut dst_off = 0usize;

    while remaining > 0 {
        let block_start = block_index as usize * block_align as usize;
        let block_bytes = &buffer.data[block_start..block_start + block_align as usize];
        decode_mono_block(block_bytes, &mut block_cache, block_align);

        let copy = remaining.min(bsize as usize - mid_offset);
        let src = &block_cache[mid_offset..mid_offset + copy];
        let dst_slice = &mut dst[dst_off..dst_off + copy];
        let as_f32: Vec<Sample> = src.iter().map(|&s| s as f32 / 32768.0).collect();
        dst_slice.copy_from_slice(&as_f32);

        dst_off += copy;
        remaining -= copy;
        block_index += 1;
        mid_offset = 0;
    }
    Ok(())
}

fn decode_msadpcm_stereo(
    buffer: &AudioBuffer,
    format: &WaveFormat,
    start_frame: u32,
    dst: &mut [Sample],
    frames: u32,
) -> RfResult<()> {
    let bsize = format.adpcm_block_frames() as u32;
    let block_align = format.block_align as u32;
    let mut block_cache = [0i16; 1024];

    let mut block_index = start_frame / bsize;
    let mut mid_offset = (start_frame % bsize) as usize;
    let mut remaining = frames as usize;
    let mut dst_off = 0usize;

    while remaining > 0 {
        let block_start = block_index as usize * block_align as usize;
        let block_bytes = &buffer.data[block_start..block_start + block_align as usize];
        decode_stereo_block(block_bytes, &mut block_cache, block_align);

        let copy = remaining.min(bsize as usize - mid_offset);
        let src = &block_cache[mid_offset * 2..(mid_offset + copy) * 2];
        let dst_slice = &mut dst[dst_off..dst_off + copy * 2];
        let as_f32: Vec<Sample> = src.iter().map(|&s| s as f32 / 32768.0).collect();
        dst_slice.copy_from_slice(&as_f32);

        dst_off += copy * 2;
        remaining -= copy;
        block_index += 1;
        mid_offset = 0;
    }
    Ok(())
}
