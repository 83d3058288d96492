//! Connection management: presets, the connection set and the
//! verification workflow that moves candidates from one to the other.

mod manager;
mod preset;
mod set;

pub use manager::{BatchConnectionManager, BatchReport, ConnectionAttemptOutcome, UNKNOWN_CLUSTER_NAME};
pub use preset::{ImportReport, PRESET_NAMESPACE, Preset, PresetDraft, PresetStore};
pub use set::{CONNECTION_NAMESPACE, ConnectionSet};
