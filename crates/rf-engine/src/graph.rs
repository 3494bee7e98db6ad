//! Voice registry (spec §4.9, §5, component C9).
//!
//! Sources and submixes live in lock-protected maps ("linked lists
//! with locks" per spec §9 — a `HashMap` behind an `RwLock` gives the
//! same "locked once per tick, rarely mutated" shape without hand-
//! rolling a list). Each voice is additionally wrapped in its own
//! `Mutex`; the per-voice `sendLock`/`bufferLock`/`effectLock`/
//! `filterLock`/`volumeLock` hierarchy from spec §5 is collapsed into
//! that single per-voice mutex — granular enough to match the spec's
//! two-level acquire order (list, then voice) without subdividing a
//! single voice's fields into five separate locks for no operational
//! benefit here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rf_core::{RfError, RfResult, VoiceId};

use crate::voice::{MasterVoice, SourceVoice, SubmixVoice};

pub struct VoiceGraph {
    sources: RwLock<HashMap<VoiceId, Arc<Mutex<SourceVoice>>>>,
    submixes: RwLock<HashMap<VoiceId, Arc<Mutex<SubmixVoice>>>>,
    master: Arc<Mutex<MasterVoice>>,
    max_submix_stage: AtomicU32,
}

impl VoiceGraph {
    pub fn new(master_channels: u16, master_sample_rate: u32) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            submixes: RwLock::new(HashMap::new()),
            master: Arc::new(Mutex::new(MasterVoice::new(master_channels, master_sample_rate))),
            max_submix_stage: AtomicU32::new(0),
        }
    }

    pub fn master(&self) -> Arc<Mutex<MasterVoice>> {
        Arc::clone(&self.master)
    }

    pub fn add_source(&self, voice: SourceVoice) -> VoiceId {
        let id = rf_core::next_voice_id();
        self.sources.write().insert(id, Arc::new(Mutex::new(voice)));
        id
    }

    pub fn remove_source(&self, id: VoiceId) -> Option<Arc<Mutex<SourceVoice>>> {
        self.sources.write().remove(&id)
    }

    pub fn source(&self, id: VoiceId) -> Option<Arc<Mutex<SourceVoice>>> {
        self.sources.read().get(&id).cloned()
    }

    /// Snapshot of source voice ids, taken under the list lock (spec
    /// §5 lock #1). The tick iterates this snapshot, then locks each
    /// voice individually — matching the documented acquire order.
    pub fn source_ids(&self) -> Vec<VoiceId> {
        self.sources.read().keys().copied().collect()
    }

    pub fn add_submix(&self, voice: SubmixVoice) -> VoiceId {
        let id = rf_core::next_voice_id();
        self.max_submix_stage.fetch_max(voice.stage, Ordering::Relaxed);
        self.submixes.write().insert(id, Arc::new(Mutex::new(voice)));
        id
    }

    pub fn remove_submix(&self, id: VoiceId) -> Option<Arc<Mutex<SubmixVoice>>> {
        self.submixes.write().remove(&id)
    }

    pub fn submix(&self, id: VoiceId) -> Option<Arc<Mutex<SubmixVoice>>> {
        self.submixes.read().get(&id).cloned()
    }

    /// Submix ids at exactly `stage`, snapshotted under the list lock.
    pub fn submix_ids_at_stage(&self, stage: u32) -> Vec<VoiceId> {
        self.submixes
            .read()
            .iter()
            .filter(|(_, v)| v.lock().stage == stage)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn max_submix_stage(&self) -> u32 {
        self.max_submix_stage.load(Ordering::Relaxed)
    }

    /// Sample rate a send's destination consumes at (spec §4.7.1 step
    /// 1: "pick the first send's destination rate as outputRate").
    pub fn destination_rate(&self, dest: VoiceId) -> Option<u32> {
        if dest == VoiceId::MASTER {
            return Some(self.master.lock().sample_rate);
        }
        self.submix(dest).map(|s| s.lock().input_rate)
    }

    /// Lock the send destination `dest` (a submix's input cache or the
    /// master's accumulation buffer), grow it to `frames` frames if
    /// needed, and run `f` against its buffer and declared channel
    /// count. Returns `Err(InvalidArgument)` if `dest` names neither a
    /// live submix nor the master (spec §3 "Every Send references a
    /// voice that outlives it" — a dangling send is a caller error).
    pub fn mix_into<F>(&self, dest: VoiceId, frames: usize, f: F) -> RfResult<()>
    where
        F: FnOnce(&mut [rf_core::Sample], u16),
    {
        if dest == VoiceId::MASTER {
            let mut master = self.master.lock();
            master.ensure_accum(frames);
            let channels = master.common.output_channels;
            f(&mut master.accum, channels);
            return Ok(());
        }

        let submix = self
            .submix(dest)
            .ok_or_else(|| RfError::InvalidArgument(format!("send destination {dest:?} no longer exists")))?;
        let mut submix = submix.lock();
        submix.ensure_input_cache(frames);
        let channels = submix.input_channels;
        f(&mut submix.input_cache, channels);
        Ok(())
    }
}
