//! Session state: the catalog, the selected agent and its transcript.

use agentdeck_client::{
    refresh_catalog, Agent, Catalog, ChatMessage, ClientError, ModelApi, StreamAccumulator,
    StreamFailure, UpdateFn, UNKNOWN_BASE_MODEL,
};
use agentdeck_modelfile::{
    default_parameters, parse_modelfile, parse_parameter_listing, ModelDefinition, Parameters,
    DEFAULT_SYSTEM_PROMPT,
};
use agentdeck_store::{now_millis, AgentConfig, KeyValueStore, PresetStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    #[error("Model server is not reachable")]
    Offline,

    #[error("No agent named '{0}'")]
    UnknownAgent(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Stream(#[from] StreamFailure),

    /// The server reported an error inside a streamed response.
    #[error("Server error: {0}")]
    Server(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a chat turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// The full reply, now part of the transcript.
    Completed(String),
    /// The reply broke off. The partial text is kept for display only.
    Interrupted { partial: String, error: String },
}

/// Editable form of an agent preset.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDraft {
    pub display_name: String,
    pub base_model: String,
    pub system_prompt: String,
    pub parameters: Parameters,
    /// Model name of the agent being edited; `None` creates a new one.
    pub editing: Option<String>,
}

impl AgentDraft {
    pub fn new(display_name: impl Into<String>, base_model: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            base_model: base_model.into(),
            system_prompt: String::new(),
            parameters: default_parameters(),
            editing: None,
        }
    }

    fn from_config(config: AgentConfig) -> Self {
        let mut parameters = default_parameters();
        parameters.extend(config.parameters);
        Self {
            editing: Some(config.model_name),
            display_name: config.display_name,
            base_model: config.base_model,
            system_prompt: config.system_prompt,
            parameters,
        }
    }

    /// Server-side model name this draft is saved under.
    pub fn model_name(&self, now_ms: i64) -> String {
        match &self.editing {
            Some(name) => name.clone(),
            None => derive_model_name(self.display_name.trim(), now_ms),
        }
    }

    /// The definition sent to the server. An empty system prompt is replaced
    /// by the default one.
    pub fn to_definition(&self) -> ModelDefinition {
        let system = match self.system_prompt.trim() {
            "" => DEFAULT_SYSTEM_PROMPT,
            prompt => prompt,
        };
        ModelDefinition {
            from: self.base_model.trim().to_string(),
            system: system.to_string(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Server-side model name for a new agent.
///
/// Lower-cases the display name and maps every character outside
/// `[a-z0-9-_]` to `-`. A name that ends up empty or a lone `-` falls back
/// to `agent-<millis>`.
pub fn derive_model_name(display_name: &str, now_ms: i64) -> String {
    let name: String = display_name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect();

    if name.is_empty() || name == "-" {
        format!("agent-{}", now_ms)
    } else {
        name
    }
}

/// One user's view of the model server.
pub struct Session<A, S> {
    api: A,
    presets: PresetStore<S>,
    catalog: Catalog,
    current: Option<Agent>,
    history: Vec<ChatMessage>,
    keep_history: bool,
}

impl<A: ModelApi, S: KeyValueStore> Session<A, S> {
    pub fn new(api: A, store: S, keep_history: bool) -> Self {
        Self {
            api,
            presets: PresetStore::new(store),
            catalog: Catalog::default(),
            current: None,
            history: Vec::new(),
            keep_history,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current_agent(&self) -> Option<&Agent> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn presets(&self) -> &PresetStore<S> {
        &self.presets
    }

    pub fn set_keep_history(&mut self, keep: bool) {
        self.keep_history = keep;
    }

    /// Probe the server, then load the catalog.
    pub async fn connect(&mut self) -> Result<&Catalog, SessionError> {
        if !self.api.probe().await {
            return Err(SessionError::Offline);
        }
        self.refresh().await
    }

    /// Reload the catalog. On failure the previous catalog stays in place.
    pub async fn refresh(&mut self) -> Result<&Catalog, SessionError> {
        let mut catalog = refresh_catalog(&self.api).await?;

        for agent in &mut catalog.agents {
            if let Some(config) = self.presets.get(&agent.model_name) {
                if !config.display_name.is_empty() {
                    agent.display_name = config.display_name;
                }
            }
        }

        if let Some(current) = &self.current {
            if catalog.find_agent(&current.model_name).is_none() {
                info!("Agent '{}' is gone, closing it", current.model_name);
                self.current = None;
                self.history.clear();
            }
        }

        self.catalog = catalog;
        Ok(&self.catalog)
    }

    /// Switch to another agent. The outgoing transcript is saved first.
    pub fn select_agent(&mut self, name: &str) -> Result<&Agent, SessionError> {
        let agent = self
            .catalog
            .find_agent(name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownAgent(name.to_string()))?;

        self.save_current_history()?;

        self.presets.set_last_agent(&agent)?;
        self.presets.touch_recent(&agent, now_millis())?;
        self.history = self.presets.load_history(&agent.model_name);
        debug!(
            "Selected '{}' with {} stored messages",
            agent.model_name,
            self.history.len()
        );

        Ok(&*self.current.insert(agent))
    }

    /// Reopen the agent selected last time, if it still exists.
    pub fn restore_last_agent(&mut self) -> Option<&Agent> {
        let last = self.presets.last_agent()?;
        if self.catalog.find_agent(&last.model_name).is_none() {
            return None;
        }
        match self.select_agent(&last.model_name) {
            Ok(agent) => Some(agent),
            Err(e) => {
                warn!("Failed to restore '{}': {}", last.model_name, e);
                None
            }
        }
    }

    /// Close the current agent, saving its transcript.
    pub fn close_agent(&mut self) -> Result<(), SessionError> {
        self.save_current_history()?;
        self.current = None;
        self.history.clear();
        Ok(())
    }

    fn save_current_history(&mut self) -> Result<(), SessionError> {
        if let Some(current) = &self.current {
            if !self.history.is_empty() {
                self.presets.save_history(&current.model_name, &self.history)?;
            }
        }
        Ok(())
    }

    /// Send a message to the current agent and stream the reply.
    pub async fn send(
        &mut self,
        message: &str,
        on_update: &mut UpdateFn<'_>,
    ) -> Result<ChatOutcome, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::Validation("Message is empty".to_string()));
        }
        let model_name = match &self.current {
            Some(agent) => agent.model_name.clone(),
            None => return Err(SessionError::Validation("No agent selected".to_string())),
        };

        self.history.push(ChatMessage::user(message));
        let outgoing = if self.keep_history {
            &self.history[..]
        } else {
            &self.history[self.history.len() - 1..]
        };

        let reply = match self.api.chat(&model_name, outgoing, on_update).await {
            Ok(reply) => reply,
            Err(failure) => {
                return Ok(ChatOutcome::Interrupted {
                    partial: failure.partial.text,
                    error: failure.source.to_string(),
                })
            }
        };

        if let Some(error) = reply.error {
            return Ok(ChatOutcome::Interrupted {
                partial: reply.text,
                error,
            });
        }

        self.history.push(ChatMessage::assistant(reply.text.clone()));
        self.presets.save_history(&model_name, &self.history)?;
        Ok(ChatOutcome::Completed(reply.text))
    }

    /// Empty the transcript of the current agent.
    pub fn clear_history(&mut self) -> Result<(), SessionError> {
        self.history.clear();
        if let Some(current) = &self.current {
            self.presets.clear_history(&current.model_name)?;
        }
        Ok(())
    }

    /// Transcript of any agent, as stored.
    pub fn stored_history(&self, name: &str) -> Vec<ChatMessage> {
        let model_name = self
            .catalog
            .find_agent(name)
            .map_or(name, |agent| agent.model_name.as_str());
        self.presets.load_history(model_name)
    }

    /// Clear the stored transcript of any agent.
    pub fn clear_stored_history(&mut self, name: &str) -> Result<(), SessionError> {
        let is_current = self
            .current
            .as_ref()
            .map_or(false, |agent| agent.answers_to(name));
        if is_current {
            return self.clear_history();
        }
        self.presets.clear_history(name)?;
        Ok(())
    }

    /// Create an agent, or replace the one named in `draft.editing`.
    pub async fn save_agent(&mut self, draft: &AgentDraft) -> Result<AgentConfig, SessionError> {
        let display_name = draft.display_name.trim();
        let base_model = draft.base_model.trim();
        if display_name.is_empty() || base_model.is_empty() {
            return Err(SessionError::Validation(
                "An agent needs a name and a base model".to_string(),
            ));
        }

        let model_name = draft.model_name(now_millis());
        let modelfile = draft.to_definition().to_modelfile();

        if draft.editing.is_some() {
            match self.api.delete_model(&model_name).await {
                Ok(()) => {}
                Err(ClientError::Status { status, message }) => {
                    warn!(
                        "Deleting old '{}' returned {}: {}",
                        model_name, status, message
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.api.create_model(&model_name, &modelfile).await?;

        let config = AgentConfig {
            model_name: model_name.clone(),
            display_name: display_name.to_string(),
            base_model: base_model.to_string(),
            system_prompt: draft.system_prompt.trim().to_string(),
            parameters: draft.parameters.clone(),
        };
        self.presets.put(&model_name, &config)?;
        info!("Saved agent '{}'", model_name);

        if let Err(e) = self.refresh().await {
            warn!("Failed to reload models: {}", e);
        }
        Ok(config)
    }

    /// Draft for editing an existing agent.
    ///
    /// Uses the stored preset when there is one, otherwise the definition
    /// reported by the server, otherwise defaults on top of the associated
    /// base model.
    pub async fn edit_draft(&self, name: &str) -> Result<AgentDraft, SessionError> {
        let agent = self
            .catalog
            .find_agent(name)
            .ok_or_else(|| SessionError::UnknownAgent(name.to_string()))?;

        if let Some(config) = self.presets.get(&agent.model_name) {
            let mut draft = AgentDraft::from_config(config);
            draft.editing = Some(agent.model_name.clone());
            return Ok(draft);
        }

        let fallback_base = if agent.base_model == UNKNOWN_BASE_MODEL {
            String::new()
        } else {
            agent.base_model.clone()
        };
        let mut draft = AgentDraft::new(agent.display_name.clone(), fallback_base);
        draft.editing = Some(agent.model_name.clone());

        match self.api.show(&agent.model_name).await {
            Ok(shown) => {
                let mut def = parse_modelfile(&shown.modelfile);
                if def.system.is_empty() {
                    if let Some(system) = shown.system.as_deref() {
                        def.system = system.trim().to_string();
                    }
                }
                if def.parameters.is_empty() {
                    if let Some(listing) = shown.parameters.as_deref() {
                        def.parameters = parse_parameter_listing(listing);
                    }
                }
                // Installed definitions usually point FROM at a blob path.
                if let Some(base) = self.catalog.find_base_model(&def.from) {
                    draft.base_model = base.name.clone();
                }
                draft.system_prompt = def.system;
                draft.parameters.extend(def.parameters);
            }
            Err(e) => warn!("Failed to load definition of '{}': {}", agent.model_name, e),
        }

        Ok(draft)
    }

    /// Delete an agent from the server and forget everything stored about it.
    pub async fn delete_agent(&mut self, name: &str) -> Result<(), SessionError> {
        let model_name = self
            .catalog
            .find_agent(name)
            .map_or_else(|| name.to_string(), |agent| agent.model_name.clone());

        self.api.delete_model(&model_name).await?;
        self.presets.remove(&model_name)?;

        let was_current = self
            .current
            .as_ref()
            .map_or(false, |agent| agent.answers_to(&model_name));
        if was_current {
            self.current = None;
            self.history.clear();
        }
        info!("Deleted agent '{}'", model_name);

        if let Err(e) = self.refresh().await {
            warn!("Failed to reload models: {}", e);
        }
        Ok(())
    }

    /// Delete a base model from the server.
    pub async fn delete_base_model(&mut self, name: &str) -> Result<(), SessionError> {
        self.api.delete_model(name).await?;
        info!("Deleted base model '{}'", name);

        if let Err(e) = self.refresh().await {
            warn!("Failed to reload models: {}", e);
        }
        Ok(())
    }

    /// Download a model, reporting progress through `on_update`.
    pub async fn pull(
        &mut self,
        name: &str,
        on_update: &mut UpdateFn<'_>,
    ) -> Result<StreamAccumulator, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation("Model name is empty".to_string()));
        }

        let progress = self.api.pull(name, on_update).await?;
        if let Some(error) = progress.error {
            return Err(SessionError::Server(error));
        }

        if let Err(e) = self.refresh().await {
            warn!("Failed to reload models: {}", e);
        }
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use agentdeck_client::{ModelSummary, ShowResponse, StreamRecord};
    use agentdeck_modelfile::ParamValue;
    use agentdeck_store::{MemoryStore, LAST_AGENT_KEY};
    use async_trait::async_trait;

    /// What a scripted chat reply does.
    enum Reply {
        Lines(Vec<&'static str>),
        FailAfter(Vec<&'static str>),
    }

    #[derive(Default)]
    struct ScriptedApi {
        online: bool,
        models: Mutex<Vec<String>>,
        shown: Option<ShowResponse>,
        replies: Mutex<VecDeque<Reply>>,
        sent: Mutex<Vec<Vec<ChatMessage>>>,
        calls: Mutex<Vec<String>>,
        fail_listing: bool,
    }

    impl ScriptedApi {
        fn with_models(names: &[&str]) -> Self {
            Self {
                online: true,
                models: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
                ..Default::default()
            }
        }

        fn reply(self, reply: Reply) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn play(lines: &[&str], on_update: &mut UpdateFn<'_>) -> StreamAccumulator {
            let mut acc = StreamAccumulator::new();
            for line in lines {
                if let Ok(Some(record)) = StreamRecord::parse(line) {
                    acc.apply(&record);
                    on_update(&record, &acc);
                }
            }
            acc
        }
    }

    #[async_trait]
    impl ModelApi for ScriptedApi {
        async fn probe(&self) -> bool {
            self.online
        }

        async fn list_models(&self) -> Result<Vec<ModelSummary>, ClientError> {
            if self.fail_listing {
                return Err(ClientError::Unreachable("http://test".into()));
            }
            let models = self.models.lock().unwrap();
            Ok(models.iter().map(ModelSummary::named).collect())
        }

        async fn show(&self, name: &str) -> Result<ShowResponse, ClientError> {
            match &self.shown {
                Some(shown) => Ok(shown.clone()),
                None => Err(ClientError::Status {
                    status: 404,
                    message: format!("model '{}' not found", name),
                }),
            }
        }

        async fn create_model(&self, name: &str, modelfile: &str) -> Result<(), ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {}\n{}", name, modelfile));
            self.models.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn delete_model(&self, name: &str) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(format!("delete {}", name));
            let mut models = self.models.lock().unwrap();
            let before = models.len();
            models.retain(|m| m != name);
            if models.len() == before {
                return Err(ClientError::Status {
                    status: 404,
                    message: format!("model '{}' not found", name),
                });
            }
            Ok(())
        }

        async fn pull(
            &self,
            name: &str,
            on_update: &mut UpdateFn<'_>,
        ) -> Result<StreamAccumulator, StreamFailure> {
            let acc = Self::play(
                &[
                    r#"{"status":"pulling manifest"}"#,
                    r#"{"status":"downloading","completed":50,"total":200}"#,
                    r#"{"status":"success"}"#,
                ],
                on_update,
            );
            self.models.lock().unwrap().push(name.to_string());
            Ok(acc)
        }

        async fn chat(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            on_update: &mut UpdateFn<'_>,
        ) -> Result<StreamAccumulator, StreamFailure> {
            self.sent.lock().unwrap().push(messages.to_vec());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Lines(lines)) => Ok(Self::play(&lines, on_update)),
                Some(Reply::FailAfter(lines)) => Err(StreamFailure {
                    partial: Self::play(&lines, on_update),
                    source: ClientError::Stream("connection reset".into()),
                }),
                None => Ok(StreamAccumulator::new()),
            }
        }
    }

    fn session(api: ScriptedApi) -> Session<ScriptedApi, MemoryStore> {
        Session::new(api, MemoryStore::new(), true)
    }

    fn ignore() -> impl FnMut(&StreamRecord, &StreamAccumulator) + Send {
        |_: &StreamRecord, _: &StreamAccumulator| {}
    }

    #[test]
    fn test_derive_model_name() {
        assert_eq!(derive_model_name("My Writer", 1), "my-writer");
        assert_eq!(derive_model_name("code_bot-2", 1), "code_bot-2");
        assert_eq!(derive_model_name("?", 42), "agent-42");
        assert_eq!(derive_model_name("", 42), "agent-42");
    }

    #[tokio::test]
    async fn test_connect_offline() {
        let mut s = session(ScriptedApi::default());
        assert!(matches!(s.connect().await, Err(SessionError::Offline)));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_catalog() {
        let mut s = session(ScriptedApi::with_models(&["qwen2:7b", "helper"]));
        s.connect().await.unwrap();
        assert_eq!(s.catalog().agents.len(), 1);

        s.api.fail_listing = true;
        match s.refresh().await {
            Err(SessionError::Client(e)) => assert!(e.is_connectivity()),
            other => panic!("expected a client error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(s.catalog().agents.len(), 1);
        assert_eq!(s.catalog().base_models.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_turn_is_persisted() {
        let api = ScriptedApi::with_models(&["qwen2:7b", "helper:latest"]).reply(Reply::Lines(
            vec![
                r#"{"message":{"role":"assistant","content":"Hel"}}"#,
                r#"{"message":{"role":"assistant","content":"lo"}}"#,
                r#"{"done":true}"#,
            ],
        ));
        let mut s = session(api);
        s.connect().await.unwrap();
        s.select_agent("helper").unwrap();

        let mut fragments = Vec::new();
        let mut collect = |record: &StreamRecord, _: &StreamAccumulator| {
            if let Some(text) = record.content() {
                fragments.push(text.to_string());
            }
        };
        let outcome = s.send("  hi  ", &mut collect).await.unwrap();

        assert_eq!(outcome, ChatOutcome::Completed("Hello".to_string()));
        assert_eq!(fragments, vec!["Hel", "lo"]);
        assert_eq!(
            s.history(),
            &[ChatMessage::user("hi"), ChatMessage::assistant("Hello")]
        );
        assert_eq!(s.presets().load_history("helper").len(), 2);
    }

    #[tokio::test]
    async fn test_keep_history_off_sends_last_message() {
        let api = ScriptedApi::with_models(&["helper"])
            .reply(Reply::Lines(vec![r#"{"message":{"content":"one"}}"#]))
            .reply(Reply::Lines(vec![r#"{"message":{"content":"two"}}"#]));
        let mut s = session(api);
        s.connect().await.unwrap();
        s.select_agent("helper").unwrap();

        s.send("first", &mut ignore()).await.unwrap();
        s.set_keep_history(false);
        s.send("second", &mut ignore()).await.unwrap();

        let sent = s.api.sent.lock().unwrap();
        assert_eq!(sent[0], vec![ChatMessage::user("first")]);
        assert_eq!(sent[1], vec![ChatMessage::user("second")]);
        assert_eq!(s.history().len(), 4);
    }

    #[tokio::test]
    async fn test_interrupted_reply_keeps_partial_out_of_history() {
        let api = ScriptedApi::with_models(&["helper"]).reply(Reply::FailAfter(vec![
            r#"{"message":{"content":"Half an ans"}}"#,
        ]));
        let mut s = session(api);
        s.connect().await.unwrap();
        s.select_agent("helper").unwrap();

        match s.send("question", &mut ignore()).await.unwrap() {
            ChatOutcome::Interrupted { partial, error } => {
                assert_eq!(partial, "Half an ans");
                assert!(error.contains("connection reset"));
            }
            other => panic!("expected interruption, got {:?}", other),
        }
        assert_eq!(s.history(), &[ChatMessage::user("question")]);
        assert!(s.presets().load_history("helper").is_empty());
    }

    #[tokio::test]
    async fn test_send_validation() {
        let mut s = session(ScriptedApi::with_models(&["helper"]));
        s.connect().await.unwrap();
        assert!(matches!(
            s.send("hello", &mut ignore()).await,
            Err(SessionError::Validation(_))
        ));
        s.select_agent("helper").unwrap();
        assert!(matches!(
            s.send("   ", &mut ignore()).await,
            Err(SessionError::Validation(_))
        ));
        assert!(s.api.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_switching_agents_saves_and_restores_history() {
        let api = ScriptedApi::with_models(&["writer", "coder"])
            .reply(Reply::Lines(vec![r#"{"message":{"content":"ok"}}"#]));
        let mut s = session(api);
        s.connect().await.unwrap();

        s.select_agent("writer").unwrap();
        s.send("draft a poem", &mut ignore()).await.unwrap();
        s.select_agent("coder").unwrap();
        assert!(s.history().is_empty());

        s.select_agent("writer:latest").unwrap();
        assert_eq!(s.history().len(), 2);

        let recent: Vec<_> = s
            .presets()
            .recent_agents()
            .into_iter()
            .map(|r| r.model_name)
            .collect();
        assert_eq!(recent, vec!["writer", "coder"]);
        assert_eq!(s.presets().last_agent().unwrap().model_name, "writer");
    }

    #[tokio::test]
    async fn test_restore_last_agent() {
        let mut store = MemoryStore::new();
        let last = serde_json::to_string(&Agent::new("writer", "unknown")).unwrap();
        store.set(LAST_AGENT_KEY, &last).unwrap();
        let mut s = Session::new(ScriptedApi::with_models(&["writer"]), store, true);
        s.connect().await.unwrap();
        assert_eq!(s.restore_last_agent().unwrap().model_name, "writer");

        let mut gone = Session::new(ScriptedApi::with_models(&["coder"]), MemoryStore::new(), true);
        gone.connect().await.unwrap();
        assert!(gone.restore_last_agent().is_none());
    }

    #[tokio::test]
    async fn test_save_agent_creates_and_persists() {
        let mut s = session(ScriptedApi::with_models(&["llama3:8b"]));
        s.connect().await.unwrap();

        let mut draft = AgentDraft::new("Story Teller", "llama3:8b");
        draft
            .parameters
            .insert("temperature".into(), ParamValue::Number(1.2));
        let config = s.save_agent(&draft).await.unwrap();

        assert_eq!(config.model_name, "story-teller");
        assert_eq!(config.system_prompt, "");
        let calls = s.api.calls();
        assert!(calls[0].starts_with("create story-teller\nFROM llama3:8b"));
        assert!(calls[0].contains("PARAMETER temperature 1.2"));
        assert!(calls[0].contains(DEFAULT_SYSTEM_PROMPT));

        assert_eq!(s.presets().get("story-teller:latest"), Some(config));
        let agent = s.catalog().find_agent("story-teller").unwrap();
        assert_eq!(agent.display_name, "Story Teller");
    }

    #[tokio::test]
    async fn test_save_agent_requires_name_and_base() {
        let mut s = session(ScriptedApi::with_models(&[]));
        let err = s.save_agent(&AgentDraft::new("  ", "llama3")).await;
        assert!(matches!(err, Err(SessionError::Validation(_))));
        let err = s.save_agent(&AgentDraft::new("Writer", "")).await;
        assert!(matches!(err, Err(SessionError::Validation(_))));
        assert!(s.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_replaces_server_model() {
        let mut s = session(ScriptedApi::with_models(&["llama3:8b"]));
        s.connect().await.unwrap();
        s.save_agent(&AgentDraft::new("Writer", "llama3:8b"))
            .await
            .unwrap();

        let mut draft = s.edit_draft("writer").await.unwrap();
        assert_eq!(draft.editing.as_deref(), Some("writer"));
        assert_eq!(draft.base_model, "llama3:8b");
        draft.display_name = "Renamed".into();
        draft.system_prompt = "Be brief.".into();
        s.save_agent(&draft).await.unwrap();

        let calls = s.api.calls();
        assert_eq!(calls[1], "delete writer");
        assert!(calls[2].starts_with("create writer\n"));
        assert_eq!(s.presets().get("writer").unwrap().display_name, "Renamed");
    }

    #[tokio::test]
    async fn test_edit_draft_from_server_definition() {
        let api = ScriptedApi {
            shown: Some(ShowResponse {
                modelfile:
                    "FROM qwen2:7b\nPARAMETER temperature 0.3\nSYSTEM \"\"\"Answer in French.\"\"\""
                        .to_string(),
                ..Default::default()
            }),
            ..ScriptedApi::with_models(&["qwen2:7b", "translator"])
        };
        let mut s = session(api);
        s.connect().await.unwrap();

        let draft = s.edit_draft("translator").await.unwrap();
        assert_eq!(draft.base_model, "qwen2:7b");
        assert_eq!(draft.system_prompt, "Answer in French.");
        assert_eq!(draft.parameters["temperature"], ParamValue::Number(0.3));
        assert_eq!(draft.parameters["num_ctx"], ParamValue::Number(2048.0));
    }

    #[tokio::test]
    async fn test_edit_draft_uses_reported_system_and_parameters() {
        let api = ScriptedApi {
            shown: Some(ShowResponse {
                modelfile: "FROM /root/.ollama/models/blobs/sha256-6a07\n".to_string(),
                parameters: Some("num_ctx                        8192\nseed 3\n".to_string()),
                system: Some("  Reply in haiku.\n".to_string()),
            }),
            ..ScriptedApi::with_models(&["llama3:8b", "poet-llama3"])
        };
        let mut s = session(api);
        s.connect().await.unwrap();

        let draft = s.edit_draft("poet-llama3").await.unwrap();
        assert_eq!(draft.base_model, "llama3:8b");
        assert_eq!(draft.system_prompt, "Reply in haiku.");
        assert_eq!(draft.parameters["num_ctx"], ParamValue::Number(8192.0));
        assert_eq!(draft.parameters["seed"], ParamValue::Number(3.0));
        assert_eq!(draft.parameters["temperature"], ParamValue::Number(0.8));
    }

    #[test]
    fn test_draft_model_name() {
        let mut draft = AgentDraft::new("  Code Helper ", "qwen2:7b");
        assert_eq!(draft.model_name(7), "code-helper");
        draft.editing = Some("helper:latest".into());
        assert_eq!(draft.model_name(7), "helper:latest");
    }

    #[tokio::test]
    async fn test_edit_draft_falls_back_to_defaults() {
        let mut s = session(ScriptedApi::with_models(&["qwen2:7b", "my-helper"]));
        s.connect().await.unwrap();

        let draft = s.edit_draft("my-helper").await.unwrap();
        assert_eq!(draft.base_model, "");
        assert_eq!(draft.parameters, default_parameters());
        assert!(matches!(
            s.edit_draft("nobody").await,
            Err(SessionError::UnknownAgent(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_current_agent() {
        let api = ScriptedApi::with_models(&["writer:latest", "coder"])
            .reply(Reply::Lines(vec![r#"{"message":{"content":"ok"}}"#]));
        let mut s = session(api);
        s.connect().await.unwrap();
        s.select_agent("writer").unwrap();
        s.send("hi", &mut ignore()).await.unwrap();

        s.delete_agent("writer").await.unwrap();

        assert!(s.current_agent().is_none());
        assert!(s.history().is_empty());
        assert!(s.catalog().find_agent("writer").is_none());
        assert!(s.presets().load_history("writer:latest").is_empty());
        assert!(s.presets().last_agent().is_none());
        assert_eq!(s.api.calls(), vec!["delete writer:latest"]);
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_current_agent() {
        let mut s = session(ScriptedApi::with_models(&["writer"]));
        s.connect().await.unwrap();
        s.select_agent("writer").unwrap();

        s.api.models.lock().unwrap().clear();
        s.refresh().await.unwrap();
        assert!(s.current_agent().is_none());
    }

    #[tokio::test]
    async fn test_pull_reports_progress() {
        let mut s = session(ScriptedApi::with_models(&[]));
        let mut percents = Vec::new();
        let mut track = |_: &StreamRecord, acc: &StreamAccumulator| percents.push(acc.percent);
        let progress = s.pull("mistral", &mut track).await.unwrap();

        assert_eq!(progress.status.as_deref(), Some("success"));
        assert!(percents.contains(&Some(25)));
        assert!(s.catalog().find_base_model("mistral").is_some());
        assert!(matches!(
            s.pull(" ", &mut ignore()).await,
            Err(SessionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_base_model() {
        let mut s = session(ScriptedApi::with_models(&["mistral", "helper"]));
        s.connect().await.unwrap();
        s.delete_base_model("mistral").await.unwrap();
        assert!(s.catalog().base_models.is_empty());
        assert!(s.delete_base_model("mistral").await.is_err());
    }
}
