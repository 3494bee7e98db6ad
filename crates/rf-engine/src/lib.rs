//! rf-engine: voice graph, effect chain runner, and the per-period
//! engine tick that ties decode, resample, filter, effect, and mix
//! together (spec §4.6–§4.9).
//!
//! ## Modules
//! - `effect` — effect trait and alternating-buffer chain runner (C6)
//! - `channel_matrix` — default send matrices (§6)
//! - `voice` — source/submix/master voice data model (§3, C9)
//! - `graph` — lock-protected voice registry (§5, C9)
//! - `mixer` — source/submix voice update (C7)
//! - `engine` — the engine tick entry point (C8)

pub mod channel_matrix;
pub mod effect;
pub mod engine;
pub mod graph;
pub mod mixer;
pub mod voice;

pub use effect::{Effect, EffectChain, EffectIo, LockParams};
pub use engine::{update_engine, Engine, EngineEvents};
pub use graph::VoiceGraph;
pub use mixer::{source_update, submix_update, PassEvents};
pub use voice::{MasterVoice, Send, SourceVoice, SubmixVoice, VoiceCommon};
