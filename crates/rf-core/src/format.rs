//! Source waveform format description (spec §3, "Source voice extra").

use serde::{Deserialize, Serialize};

/// Which decoder a source voice's waveform format selects (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatTag {
    Pcm8,
    Pcm16,
    Pcm32Float,
    AdpcmMono,
    AdpcmStereo,
}

/// Describes a source voice's input waveform: sample rate, channel
/// count, bits-per-sample, block alignment (ADPCM), and format tag.
/// Immutable once a source voice is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveFormat {
    pub tag: FormatTag,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Only meaningful for ADPCM formats; byte stride of one encoded
    /// block.
    pub block_align: u16,
}

impl WaveFormat {
    pub fn pcm16(channels: u16, sample_rate: u32) -> Self {
        Self {
            tag: FormatTag::Pcm16,
            channels,
            sample_rate,
            bits_per_sample: 16,
            block_align: channels * 2,
        }
    }

    pub fn pcm8(channels: u16, sample_rate: u32) -> Self {
        Self {
            tag: FormatTag::Pcm8,
            channels,
            sample_rate,
            bits_per_sample: 8,
            block_align: channels,
        }
    }

    pub fn pcm32f(channels: u16, sample_rate: u32) -> Self {
        Self {
            tag: FormatTag::Pcm32Float,
            channels,
            sample_rate,
            bits_per_sample: 32,
            block_align: channels * 4,
        }
    }

    pub fn adpcm(channels: u16, sample_rate: u32, block_align: u16) -> Self {
        Self {
            tag: if channels == 1 {
                FormatTag::AdpcmMono
            } else {
                FormatTag::AdpcmStereo
            },
            channels,
            sample_rate,
            bits_per_sample: 4,
            block_align,
        }
    }

    /// MSADPCM frames encoded per block (spec §4.2).
    pub fn adpcm_block_frames(&self) -> usize {
        match self.tag {
            FormatTag::AdpcmMono => (self.block_align as usize - 6) * 2,
            FormatTag::AdpcmStereo => (self.block_align as usize / 2 - 6) * 2,
            _ => 0,
        }
    }
}
