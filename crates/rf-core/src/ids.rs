//! Opaque identifiers for voices and effect chain slots.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a voice (source, submix, or master) within the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

impl VoiceId {
    /// The engine always assigns the master voice id 0.
    pub const MASTER: Self = Self(0);
}

static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-wide unique, monotonically increasing voice id.
/// The master voice is the only one that gets id 0, assigned directly
/// by the engine at construction.
pub fn next_voice_id() -> VoiceId {
    VoiceId(NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = next_voice_id();
        let b = next_voice_id();
        assert!(b.0 > a.0);
    }
}
