//! Agent commands.

use agentdeck_client::{DeckConfig, UNKNOWN_BASE_MODEL};
use agentdeck_modelfile::{ParamValue, Parameters};
use agentdeck_store::now_millis;

use super::format_relative_time;
use crate::session::{AgentDraft, SessionError};

/// Fields to change on an existing agent.
#[derive(Debug, Default)]
pub(crate) struct AgentChanges {
    pub display_name: Option<String>,
    pub base_model: Option<String>,
    pub system_prompt: Option<String>,
    pub params: Vec<String>,
}

/// List agents.
pub(crate) async fn list(config: &DeckConfig) -> miette::Result<()> {
    let session = super::connect(config).await?;
    let catalog = session.catalog();

    if catalog.agents.is_empty() {
        println!("No agents yet.");
        println!();
        println!("To create one, run:");
        println!("  agentdeck create <name> --base <model>");
        return Ok(());
    }

    let last = session.presets().last_agent();
    println!("Agents:");
    for agent in &catalog.agents {
        let marker = match &last {
            Some(last) if agent.answers_to(&last.model_name) => "*",
            _ => " ",
        };
        if agent.display_name == agent.model_name {
            println!("{} {}  [{}]", marker, agent.model_name, agent.base_model);
        } else {
            println!(
                "{} {} ({})  [{}]",
                marker, agent.display_name, agent.model_name, agent.base_model
            );
        }
    }

    Ok(())
}

/// Show recently used agents. Works without the server.
pub(crate) fn recent(config: &DeckConfig) -> miette::Result<()> {
    let session = super::open(config);
    let recent = session.presets().recent_agents();

    if recent.is_empty() {
        println!("No recently used agents.");
        return Ok(());
    }

    let now = now_millis();
    println!("Recently used:");
    for entry in recent {
        println!(
            "  {:<24} {}",
            entry.display_name,
            format_relative_time(entry.last_used, now)
        );
    }

    Ok(())
}

/// Print an agent's preset as its definition document.
pub(crate) async fn show(config: &DeckConfig, name: &str) -> miette::Result<()> {
    let session = super::connect(config).await?;
    let draft = session
        .edit_draft(name)
        .await
        .map_err(|e| miette::miette!("Failed to load agent: {}", e))?;

    println!("Name:  {}", draft.display_name);
    if let Some(model_name) = &draft.editing {
        println!("Model: {}", model_name);
    }
    println!();
    print!("{}", draft.to_definition().to_modelfile());

    Ok(())
}

/// Create a new agent.
pub(crate) async fn create(
    config: &DeckConfig,
    name: &str,
    base: &str,
    system: Option<&str>,
    params: &[String],
) -> miette::Result<()> {
    let mut session = super::connect(config).await?;

    if session.catalog().find_base_model(base).is_none() {
        println!("Note: '{}' is not an installed base model.", base);
    }

    let mut draft = AgentDraft::new(name, base);
    if let Some(system) = system {
        draft.system_prompt = system.to_string();
    }
    apply_params(&mut draft.parameters, params)?;

    save(&mut session, &draft).await
}

/// Change an existing agent.
pub(crate) async fn edit(
    config: &DeckConfig,
    name: &str,
    changes: AgentChanges,
) -> miette::Result<()> {
    let mut session = super::connect(config).await?;
    let mut draft = session
        .edit_draft(name)
        .await
        .map_err(|e| miette::miette!("Failed to load agent: {}", e))?;

    if let Some(display_name) = changes.display_name {
        draft.display_name = display_name;
    }
    if let Some(base_model) = changes.base_model {
        draft.base_model = base_model;
    }
    if let Some(system_prompt) = changes.system_prompt {
        draft.system_prompt = system_prompt;
    }
    apply_params(&mut draft.parameters, &changes.params)?;

    if draft.base_model.is_empty() || draft.base_model == UNKNOWN_BASE_MODEL {
        return Err(miette::miette!(
            "The base model of '{}' is unknown, pass one with --base",
            name
        ));
    }

    save(&mut session, &draft).await
}

async fn save(session: &mut super::DeckSession, draft: &AgentDraft) -> miette::Result<()> {
    match session.save_agent(draft).await {
        Ok(config) => {
            println!(
                "Saved agent '{}' as model '{}'.",
                config.display_name, config.model_name
            );
            Ok(())
        }
        Err(SessionError::Validation(message)) => Err(miette::miette!("{}", message)),
        Err(e) => {
            print!("{}", manual_create_hint(draft, now_millis()));
            Err(miette::miette!("Failed to save agent: {}", e))
        }
    }
}

/// Instructions for creating the agent by hand with the server's own CLI.
fn manual_create_hint(draft: &AgentDraft, now_ms: i64) -> String {
    format!(
        "Save this definition as Modelfile:\n\n{}\nThen create the model manually:\n  ollama create {} -f Modelfile\n",
        draft.to_definition().to_modelfile(),
        draft.model_name(now_ms)
    )
}

/// Delete an agent and everything stored about it.
pub(crate) async fn delete(config: &DeckConfig, name: &str) -> miette::Result<()> {
    let mut session = super::connect(config).await?;

    if session.catalog().find_agent(name).is_none() {
        return Err(miette::miette!("No agent named '{}'", name));
    }

    session
        .delete_agent(name)
        .await
        .map_err(|e| miette::miette!("Failed to delete agent: {}", e))?;

    println!("Deleted agent '{}'.", name);
    Ok(())
}

/// Apply `key=value` overrides. A key given more than once collects its
/// values into a list (used for `stop` sequences).
pub(crate) fn apply_params(parameters: &mut Parameters, overrides: &[String]) -> miette::Result<()> {
    let mut seen: Vec<&str> = Vec::new();

    for raw in overrides {
        let (key, value) = raw
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| miette::miette!("Expected KEY=VALUE, got '{}'", raw))?;

        if seen.contains(&key) {
            let entry = parameters
                .entry(key.to_string())
                .or_insert_with(|| ParamValue::List(Vec::new()));
            let mut items = match std::mem::replace(entry, ParamValue::List(Vec::new())) {
                ParamValue::List(items) => items,
                other => vec![other.to_string()],
            };
            items.push(value.to_string());
            *entry = ParamValue::List(items);
        } else {
            parameters.insert(key.to_string(), ParamValue::coerce(value));
            seen.push(key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_modelfile::default_parameters;

    fn overrides(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_params() {
        let mut params = default_parameters();
        apply_params(&mut params, &overrides(&["temperature=0.2", "mirostat = 2"])).unwrap();
        assert_eq!(params["temperature"], ParamValue::Number(0.2));
        assert_eq!(params["mirostat"], ParamValue::Number(2.0));
        // Existing keys keep their position.
        assert_eq!(params.get_index_of("temperature"), Some(0));
    }

    #[test]
    fn test_repeated_key_becomes_list() {
        let mut params = Parameters::new();
        apply_params(&mut params, &overrides(&["stop=<|end|>", "stop=User:"])).unwrap();
        assert_eq!(
            params["stop"],
            ParamValue::List(vec!["<|end|>".to_string(), "User:".to_string()])
        );
    }

    #[test]
    fn test_manual_create_hint() {
        let mut draft = AgentDraft::new("Story Teller", "llama3:8b");
        let hint = manual_create_hint(&draft, 1);
        assert!(hint.contains("FROM llama3:8b\n"));
        assert!(hint.ends_with("  ollama create story-teller -f Modelfile\n"));

        draft.editing = Some("teller:latest".to_string());
        assert!(manual_create_hint(&draft, 1).contains("ollama create teller:latest -f Modelfile"));
    }

    #[test]
    fn test_malformed_param() {
        let mut params = Parameters::new();
        assert!(apply_params(&mut params, &overrides(&["temperature"])).is_err());
        assert!(apply_params(&mut params, &overrides(&["=1"])).is_err());
    }
}
