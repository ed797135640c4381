//! Agent presets, transcripts and recently used agents.

use std::time::{SystemTime, UNIX_EPOCH};

use agentdeck_client::{model_aliases, Agent, ChatMessage};
use agentdeck_modelfile::{ModelDefinition, Parameters};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::kv::KeyValueStore;

/// Key of the last selected agent.
pub const LAST_AGENT_KEY: &str = "lastAgent";

/// Key of the recently used agents list.
pub const RECENT_AGENTS_KEY: &str = "recentAgents";

/// Length cap of the recently used list.
pub const MAX_RECENT_AGENTS: usize = 4;

pub fn config_key(model_name: &str) -> String {
    format!("agent_config_{}", model_name)
}

pub fn chat_key(model_name: &str) -> String {
    format!("chat_{}", model_name)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A saved agent preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Server-side model name.
    pub model_name: String,
    pub display_name: String,
    pub base_model: String,
    pub system_prompt: String,
    pub parameters: Parameters,
}

impl AgentConfig {
    /// The definition document this preset is created from.
    pub fn to_definition(&self) -> ModelDefinition {
        ModelDefinition {
            from: self.base_model.clone(),
            system: self.system_prompt.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Rebuild a preset from a definition fetched from the server.
    pub fn from_definition(
        model_name: impl Into<String>,
        display_name: impl Into<String>,
        def: ModelDefinition,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            display_name: display_name.into(),
            base_model: def.from,
            system_prompt: def.system,
            parameters: def.parameters,
        }
    }
}

/// An entry of the recently used list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAgent {
    pub model_name: String,
    pub display_name: String,
    /// Milliseconds since the Unix epoch.
    pub last_used: i64,
}

/// Presets and transcripts on top of a [`KeyValueStore`].
pub struct PresetStore<S> {
    store: S,
}

impl<S: KeyValueStore> PresetStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Load the preset for `model_name`, trying each alias in turn.
    pub fn get(&self, model_name: &str) -> Option<AgentConfig> {
        model_aliases(model_name)
            .iter()
            .find_map(|alias| self.read_json(&config_key(alias)))
    }

    /// Save the preset under every alias of `model_name`.
    pub fn put(&mut self, model_name: &str, config: &AgentConfig) -> Result<(), StoreError> {
        let json = serde_json::to_string(config)?;
        for alias in model_aliases(model_name) {
            self.store.set(&config_key(&alias), &json)?;
        }
        debug!("Saved preset for '{}'", model_name);
        Ok(())
    }

    /// Forget everything stored about `model_name`: presets and transcripts
    /// under every alias, and any last/recent reference to it.
    pub fn remove(&mut self, model_name: &str) -> Result<(), StoreError> {
        let aliases = model_aliases(model_name);
        for alias in &aliases {
            self.store.remove(&chat_key(alias))?;
            self.store.remove(&config_key(alias))?;
        }

        if let Some(last) = self.last_agent() {
            if aliases.contains(&last.model_name) {
                self.store.remove(LAST_AGENT_KEY)?;
            }
        }

        if self.store.get(RECENT_AGENTS_KEY).is_some() {
            let recent: Vec<RecentAgent> = self
                .recent_agents()
                .into_iter()
                .filter(|entry| !aliases.contains(&entry.model_name))
                .collect();
            self.write_json(RECENT_AGENTS_KEY, &recent)?;
        }

        debug!("Removed stored data for '{}'", model_name);
        Ok(())
    }

    /// Save a transcript under every alias of `model_name`.
    pub fn save_history(
        &mut self,
        model_name: &str,
        history: &[ChatMessage],
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(history)?;
        for alias in model_aliases(model_name) {
            self.store.set(&chat_key(&alias), &json)?;
        }
        Ok(())
    }

    /// Load the transcript of `model_name`; empty when none is stored or the
    /// stored value is unreadable.
    pub fn load_history(&self, model_name: &str) -> Vec<ChatMessage> {
        model_aliases(model_name)
            .iter()
            .find_map(|alias| self.read_json(&chat_key(alias)))
            .unwrap_or_default()
    }

    /// Drop the transcript of `model_name`.
    pub fn clear_history(&mut self, model_name: &str) -> Result<(), StoreError> {
        for alias in model_aliases(model_name) {
            self.store.remove(&chat_key(&alias))?;
        }
        Ok(())
    }

    pub fn last_agent(&self) -> Option<Agent> {
        self.read_json(LAST_AGENT_KEY)
    }

    pub fn set_last_agent(&mut self, agent: &Agent) -> Result<(), StoreError> {
        self.write_json(LAST_AGENT_KEY, agent)
    }

    /// Recently used agents, newest first.
    pub fn recent_agents(&self) -> Vec<RecentAgent> {
        self.read_json(RECENT_AGENTS_KEY).unwrap_or_default()
    }

    /// Move `agent` to the front of the recently used list.
    pub fn touch_recent(&mut self, agent: &Agent, now_ms: i64) -> Result<(), StoreError> {
        let mut recent: Vec<RecentAgent> = self
            .recent_agents()
            .into_iter()
            .filter(|entry| entry.model_name != agent.model_name)
            .collect();
        recent.insert(
            0,
            RecentAgent {
                model_name: agent.model_name.clone(),
                display_name: agent.display_name.clone(),
                last_used: now_ms,
            },
        );
        recent.truncate(MAX_RECENT_AGENTS);
        self.write_json(RECENT_AGENTS_KEY, &recent)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable stored '{}': {}", key, e);
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }
}
