//! Base models versus agents.
//!
//! Every installed model is either a *base model* (a vendor-distributed
//! family such as `qwen2:7b`) or an *agent* (a user preset materialized as
//! its own model). Classification is a name-prefix heuristic and the link
//! from an agent back to its base model is a substring guess: an agent named
//! `my-qwen-helper` is associated with `qwen` even if it was built on
//! `qwen2`. Both are best-effort: the server does not report the
//! relationship in the listing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ModelApi;
use crate::error::ClientError;
use crate::types::ModelSummary;

/// Name prefixes of known model families.
pub const BASE_MODEL_PREFIXES: &[&str] = &[
    "llama",
    "qwen",
    "gemma",
    "mistral",
    "phi",
    "deepseek",
    "codellama",
    "vicuna",
    "orca",
    "nous-hermes",
    "dolphin",
    "yi",
    "mixtral",
    "solar",
    "openchat",
    "starling",
    "neural-chat",
];

/// Base model recorded for agents that match no installed base model.
pub const UNKNOWN_BASE_MODEL: &str = "unknown";

const LATEST_SUFFIX: &str = ":latest";

/// Check whether a model name belongs to a known base model family.
pub fn is_base_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    BASE_MODEL_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Drop the `:tag` suffix from a model name.
pub fn strip_tag(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

/// Every spelling a model can be stored under.
///
/// `name:latest` and `name` refer to the same model. The given spelling
/// always comes first so that lookups prefer an exact hit.
pub fn model_aliases(name: &str) -> Vec<String> {
    if name.is_empty() {
        return Vec::new();
    }

    let mut aliases = vec![name.to_string()];
    if let Some(bare) = name.strip_suffix(LATEST_SUFFIX) {
        if !bare.is_empty() {
            aliases.push(bare.to_string());
        }
    }
    if !name.contains(':') {
        aliases.push(format!("{}{}", name, LATEST_SUFFIX));
    }
    aliases
}

/// Pick the first base model whose untagged name occurs in `agent_name`.
pub fn associate_base_model(agent_name: &str, base_models: &[ModelSummary]) -> String {
    base_models
        .iter()
        .find(|base| agent_name.contains(strip_tag(&base.name)))
        .map(|base| base.name.clone())
        .unwrap_or_else(|| UNKNOWN_BASE_MODEL.to_string())
}

/// A user-defined preset, derived from a non-base model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub name: String,
    pub display_name: String,
    pub base_model: String,
    /// Server-side model identifier.
    pub model_name: String,
}

impl Agent {
    pub fn new(model_name: impl Into<String>, base_model: impl Into<String>) -> Self {
        let model_name = model_name.into();
        Self {
            name: model_name.clone(),
            display_name: model_name.clone(),
            base_model: base_model.into(),
            model_name,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Whether `name` addresses this agent, under any alias.
    pub fn answers_to(&self, name: &str) -> bool {
        model_aliases(name).iter().any(|alias| *alias == self.model_name)
    }
}

/// Installed models split into base models and agents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub base_models: Vec<ModelSummary>,
    pub agents: Vec<Agent>,
}

impl Catalog {
    /// Partition a model listing. Each model lands in exactly one list, and
    /// both lists keep server order.
    pub fn classify(models: Vec<ModelSummary>) -> Self {
        let (base_models, candidates): (Vec<_>, Vec<_>) =
            models.into_iter().partition(|m| is_base_model(&m.name));

        let agents = candidates
            .into_iter()
            .map(|model| {
                let base = associate_base_model(&model.name, &base_models);
                Agent::new(model.name, base)
            })
            .collect();

        Self {
            base_models,
            agents,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base_models.is_empty() && self.agents.is_empty()
    }

    /// Find an agent by model name, accepting either alias.
    pub fn find_agent(&self, name: &str) -> Option<&Agent> {
        self.agents
            .iter()
            .find(|a| a.model_name == name)
            .or_else(|| self.agents.iter().find(|a| a.answers_to(name)))
    }

    /// Find a base model by name, accepting either alias.
    pub fn find_base_model(&self, name: &str) -> Option<&ModelSummary> {
        let aliases = model_aliases(name);
        self.base_models
            .iter()
            .find(|m| aliases.iter().any(|alias| *alias == m.name))
    }
}

/// List installed models and classify them.
pub async fn refresh_catalog(api: &(dyn ModelApi + '_)) -> Result<Catalog, ClientError> {
    let models = api.list_models().await?;
    let catalog = Catalog::classify(models);
    debug!(
        "Catalog refreshed: {} base models, {} agents",
        catalog.base_models.len(),
        catalog.agents.len()
    );
    Ok(catalog)
}
