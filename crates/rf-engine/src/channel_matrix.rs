//! Default send (channel mix) matrices (spec §6, §9 Open Question:
//! exact XAudio2-style default coefficient tables for every
//! source/destination channel count pair were not available to port;
//! clients set their own matrix via `SetOutputMatrix` in any case, so
//! this generates a sane default rather than reproducing an undocumented
//! constant table).
//!
//! Layout matches `FAudio_INTERNAL_SetDefaultMatrix`: a flat row-major
//! array indexed `[dst_channel * src_channels + src_channel]`.

use smallvec::{smallvec, SmallVec};

/// Build the default send matrix routing `src_channels` into
/// `dst_channels`. Same channel count: identity. Mono source: spread
/// unattenuated to every destination channel. Mono destination:
/// average all source channels. Otherwise: wrap each source channel to
/// `src_channel % dst_channels` at unity gain.
pub fn default_matrix(src_channels: u16, dst_channels: u16) -> SmallVec<[f32; 64]> {
    let (src, dst) = (src_channels as usize, dst_channels as usize);
    let mut m: SmallVec<[f32; 64]> = smallvec![0.0; src * dst];

    if src == dst {
        for i in 0..src {
            m[i * src + i] = 1.0;
        }
    } else if src == 1 {
        for co in 0..dst {
            m[co * src] = 1.0;
        }
    } else if dst == 1 {
        let coeff = 1.0 / src as f32;
        for ci in 0..src {
            m[ci] = coeff;
        }
    } else {
        for ci in 0..src {
            let co = ci % dst;
            m[co * src + ci] = 1.0;
        }
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_channel_count_is_identity() {
        let m = default_matrix(2, 2);
        assert_eq!(&m[..], &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn mono_source_spreads_to_every_destination() {
        let m = default_matrix(1, 4);
        assert_eq!(&m[..], &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn mono_destination_averages_sources() {
        let m = default_matrix(4, 1);
        assert!(m.iter().all(|&c| (c - 0.25).abs() < 1e-6));
    }
}
