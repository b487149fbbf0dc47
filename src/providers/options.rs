//! Request options forwarded to a provider
//!
//! Generation settings and session options are kept as open key/value maps.
//! The engine never looks inside them; the provider serializes them as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chat::Message;

/// Opaque generation settings (`maxOutputTokens`, `temperature`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct GenerationConfig(Map<String, Value>);

impl GenerationConfig {
    pub(crate) fn new() -> GenerationConfig {
        GenerationConfig::default()
    }

    /// Sets an arbitrary option.
    pub(crate) fn with<V: Into<Value>>(mut self, key: &str, value: V) -> GenerationConfig {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub(crate) fn max_output_tokens(self, tokens: u32) -> GenerationConfig {
        self.with("maxOutputTokens", tokens)
    }

    pub(crate) fn temperature(self, temperature: f64) -> GenerationConfig {
        self.with("temperature", temperature)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything needed to open a model handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ModelParams {
    pub model: String,
    pub system_instruction: Option<String>,
    pub generation_config: GenerationConfig,
}

impl ModelParams {
    pub(crate) fn new(model: &str) -> ModelParams {
        ModelParams {
            model: model.to_string(),
            ..ModelParams::default()
        }
    }
}

/// Options a chat session starts from.
///
/// `history` is replayed in full on every call; any unrecognized keys are kept
/// in `extra` and forwarded to the provider untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionOptions {
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "GenerationConfig::is_empty")]
    pub generation_config: GenerationConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Configuration for one chat call: an optional system instruction plus the
/// options the session is started with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(flatten)]
    pub session: SessionOptions,
}

impl ChatConfig {
    pub(crate) fn with_history(history: Vec<Message>) -> ChatConfig {
        ChatConfig {
            system_instruction: None,
            session: SessionOptions {
                history,
                ..SessionOptions::default()
            },
        }
    }

    /// Separates the system instruction, which belongs to the model handle,
    /// from the options the session is started with.
    pub(crate) fn split(&self) -> (Option<&str>, &SessionOptions) {
        let system_instruction = self
            .system_instruction
            .as_deref()
            .filter(|s| !s.trim().is_empty());

        (system_instruction, &self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use serde_json::json;

    #[test]
    fn generation_config_builds_provider_keys() {
        let config = GenerationConfig::new()
            .max_output_tokens(512)
            .temperature(0.7);

        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({ "maxOutputTokens": 512, "temperature": 0.7 })
        );
    }

    #[test]
    fn chat_config_splits_system_instruction_from_session() {
        let config: ChatConfig = serde_json::from_value(json!({
            "systemInstruction": "S",
            "history": [{ "role": "user", "content": "hi" }],
            "safetySettings": []
        }))
        .unwrap();

        let (system, session) = config.split();

        assert_eq!(system, Some("S"));
        assert_eq!(session.history, vec![Message::new(Role::User, "hi".into())]);
        assert!(session.extra.contains_key("safetySettings"));
        assert!(!session.extra.contains_key("systemInstruction"));

        let session = serde_json::to_value(session).unwrap();
        assert!(session.get("systemInstruction").is_none());
    }

    #[test]
    fn blank_system_instruction_is_dropped() {
        let config = ChatConfig {
            system_instruction: Some("  ".to_string()),
            session: SessionOptions::default(),
        };

        assert_eq!(config.split().0, None);
    }
}
