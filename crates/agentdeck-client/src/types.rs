//! Wire types for the model server API.

use serde::{Deserialize, Serialize};

/// One installed model as reported by `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl ModelSummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            digest: None,
            modified_at: None,
        }
    }
}

/// Response from the tags API (list models).
#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelSummary>,
}

/// Response from the show API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowResponse {
    /// Model definition document.
    #[serde(default)]
    pub modelfile: String,
    /// Parameters as a newline separated `key value` listing.
    #[serde(default)]
    pub parameters: Option<String>,
    /// System prompt, reported separately from the definition.
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NameRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest<'a> {
    pub name: &'a str,
    pub modelfile: &'a str,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PullRequest<'a> {
    pub name: &'a str,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

/// Error body returned alongside non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_tolerates_extra_fields() {
        let json = r#"{"models":[{"name":"qwen2:7b","size":4431400262,"details":{"family":"qwen2"}},{"name":"my-helper:latest"}]}"#;
        let tags: TagsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tags.models.len(), 2);
        assert_eq!(tags.models[0].size, Some(4431400262));
        assert_eq!(tags.models[1], ModelSummary::named("my-helper:latest"));
    }

    #[test]
    fn test_tags_without_models() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());
    }

    #[test]
    fn test_chat_message_json() {
        let msg = ChatMessage::assistant("hi");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"assistant","content":"hi"}"#
        );
    }
}
