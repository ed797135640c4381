//! Local persistence for agent presets and chat transcripts.
//!
//! Records live in a flat string key-value store ([`KeyValueStore`]) under
//! these keys:
//!
//! | key | value |
//! |---|---|
//! | `agent_config_<model>` | [`AgentConfig`] JSON |
//! | `chat_<model>` | transcript JSON (array of messages) |
//! | `lastAgent` | the last selected agent |
//! | `recentAgents` | up to four [`RecentAgent`] entries, newest first |
//!
//! A model can be addressed as `name` or `name:latest`; [`PresetStore`]
//! writes every alias and reads the first alias that has a value.

mod error;
mod kv;
mod presets;

pub use error::StoreError;
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use presets::{
    chat_key, config_key, now_millis, AgentConfig, PresetStore, RecentAgent, LAST_AGENT_KEY,
    MAX_RECENT_AGENTS, RECENT_AGENTS_KEY,
};
