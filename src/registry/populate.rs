use std::env::VarError;

use tracing::{error, info, warn};

use super::{Credential, CredentialSet, ModelPriorityList, Registry};
use crate::config;
use crate::providers::gemini::BUILTIN_MODELS;

/// Environment variables for the primary key and its three backups.
pub(crate) const API_KEY_ENV_VARS: [&str; 4] = [
    "GEMINI_API_KEY",
    "GEMINI_API_KEY_2",
    "GEMINI_API_KEY_3",
    "GEMINI_API_KEY_4",
];

pub(crate) const MODEL_ENV_VAR: &str = "GEMINI_MODEL";

fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            warn!(variable = name, "ignoring environment variable that is not valid unicode");
            None
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Populate a registry from the configuration file and the environment
pub(crate) fn populated_registry(config: &config::Gemini) -> Registry {
    populated_registry_with(config, env_var)
}

/// Like [`populated_registry`] but reads variables through `lookup`. A value
/// in the configuration file wins over the variable for the same slot.
pub(crate) fn populated_registry_with<F>(config: &config::Gemini, lookup: F) -> Registry
where
    F: Fn(&str) -> Option<String>,
{
    let slots = config
        .api_key_slots()
        .into_iter()
        .zip(API_KEY_ENV_VARS)
        .map(|(configured, var)| {
            configured
                .cloned()
                .map(Credential::from)
                .and_then(Credential::non_blank)
                .or_else(|| lookup(var).map(Credential::new).and_then(Credential::non_blank))
        });

    let credentials = CredentialSet::from_slots(slots);

    if credentials.is_empty() {
        error!(
            "no Gemini API keys found, set {} (backups: {}, {}, {}) or api_key in the config",
            API_KEY_ENV_VARS[0], API_KEY_ENV_VARS[1], API_KEY_ENV_VARS[2], API_KEY_ENV_VARS[3]
        );
    }

    let model_override = config
        .model
        .as_deref()
        .and_then(non_blank)
        .or_else(|| lookup(MODEL_ENV_VAR).as_deref().and_then(non_blank));

    let models = ModelPriorityList::new(model_override.as_deref(), &BUILTIN_MODELS);

    info!(
        keys = credentials.len(),
        models = ?models.as_slice(),
        "registry populated"
    );

    Registry::new(credentials, models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |name| vars.get(name).cloned()
    }

    fn keys(registry: &Registry) -> Vec<String> {
        registry
            .credentials()
            .iter()
            .map(|c| c.expose_secret().to_string())
            .collect()
    }

    #[test]
    fn keys_come_from_environment_in_slot_order() {
        let registry = populated_registry_with(
            &config::Gemini::default(),
            lookup_from(&[
                ("GEMINI_API_KEY_4", "k4"),
                ("GEMINI_API_KEY", "k1"),
                ("GEMINI_API_KEY_2", ""),
            ]),
        );

        assert_eq!(keys(&registry), ["k1", "k4"]);
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let config = config::Gemini {
            api_key_2: Some(SecretString::new("from-config".to_string())),
            ..config::Gemini::default()
        };

        let registry = populated_registry_with(
            &config,
            lookup_from(&[("GEMINI_API_KEY", "k1"), ("GEMINI_API_KEY_2", "from-env")]),
        );

        assert_eq!(keys(&registry), ["k1", "from-config"]);
    }

    #[test]
    fn model_override_from_environment_goes_first() {
        let registry = populated_registry_with(
            &config::Gemini::default(),
            lookup_from(&[("GEMINI_MODEL", "gemini-2.0-flash")]),
        );

        assert_eq!(registry.models()[0], "gemini-2.0-flash");
        assert_eq!(registry.models().len(), BUILTIN_MODELS.len());
        assert_eq!(registry.active_model(), "gemini-2.0-flash");
    }

    #[test]
    fn blank_configured_key_falls_back_to_environment() {
        let config = config::Gemini {
            api_key: Some(SecretString::new("  ".to_string())),
            ..config::Gemini::default()
        };

        let registry = populated_registry_with(&config, lookup_from(&[("GEMINI_API_KEY", "k1")]));

        assert_eq!(keys(&registry), ["k1"]);
    }

    #[test]
    fn no_keys_is_not_fatal() {
        let registry = populated_registry_with(&config::Gemini::default(), lookup_from(&[]));

        assert!(registry.credentials().is_empty());
        assert_eq!(registry.models(), BUILTIN_MODELS);
    }
}
