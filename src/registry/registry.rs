use secrecy::{ExposeSecret, SecretString};
use std::sync::{PoisonError, RwLock};

/// An API key. `Debug` prints it redacted.
#[derive(Clone, Debug)]
pub(crate) struct Credential(SecretString);

impl Credential {
    pub(crate) fn new<S: Into<String>>(value: S) -> Credential {
        Credential(SecretString::new(value.into()))
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.0
    }

    pub(crate) fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Trims the key, or returns `None` if nothing is left.
    pub(crate) fn non_blank(self) -> Option<Credential> {
        let value = self.expose_secret().trim();

        if value.is_empty() {
            None
        } else if value.len() == self.expose_secret().len() {
            Some(self)
        } else {
            Some(Credential::new(value))
        }
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Credential {
        Credential(secret)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Credential {
        Credential::new(value)
    }
}

/// Keys in the order they are tried. Duplicates are kept: a key configured in
/// two slots is tried twice.
#[derive(Debug, Clone, Default)]
pub(crate) struct CredentialSet {
    credentials: Vec<Credential>,
}

impl CredentialSet {
    /// Builds the set from the configured slots, skipping the empty ones.
    pub(crate) fn from_slots<I, S>(slots: I) -> CredentialSet
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<Credential>,
    {
        let credentials = slots
            .into_iter()
            .flatten()
            .filter_map(|slot| slot.into().non_blank())
            .collect();

        CredentialSet { credentials }
    }

    pub(crate) fn as_slice(&self) -> &[Credential] {
        &self.credentials
    }

    pub(crate) fn len(&self) -> usize {
        self.credentials.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Model identifiers in the order they are tried.
#[derive(Debug, Clone)]
pub(crate) struct ModelPriorityList {
    models: Vec<String>,
}

impl ModelPriorityList {
    /// Puts `model_override` in front of `builtin` and removes duplicates,
    /// keeping the first occurrence of each model.
    pub(crate) fn new<S: AsRef<str>>(model_override: Option<&str>, builtin: &[S]) -> ModelPriorityList {
        let candidates = model_override
            .into_iter()
            .chain(builtin.iter().map(|model| model.as_ref()))
            .map(str::trim)
            .filter(|model| !model.is_empty());

        let mut models: Vec<String> = Vec::new();

        for model in candidates {
            if !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }

        ModelPriorityList { models }
    }

    pub(crate) fn as_slice(&self) -> &[String] {
        &self.models
    }

    pub(crate) fn first(&self) -> Option<&str> {
        self.models.first().map(|s| s.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.models.len()
    }
}

/// The model most recently observed to succeed.
///
/// Concurrent writers race and the last write wins. Readers may see a stale
/// value, which only affects status reporting.
#[derive(Debug)]
pub(crate) struct ActiveModel {
    model: RwLock<String>,
}

impl ActiveModel {
    pub(crate) fn new(model: &str) -> ActiveModel {
        ActiveModel {
            model: RwLock::new(model.to_string()),
        }
    }

    pub(crate) fn get(&self) -> String {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, model: &str) {
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = model.to_string();
    }
}

#[derive(Debug)]
pub(crate) struct Registry {
    credentials: CredentialSet,
    models: ModelPriorityList,
    active: ActiveModel,
}

impl Registry {
    pub(crate) fn new(credentials: CredentialSet, models: ModelPriorityList) -> Registry {
        let active = ActiveModel::new(models.first().unwrap_or_default());

        Registry {
            credentials,
            models,
            active,
        }
    }

    pub(crate) fn credentials(&self) -> &[Credential] {
        self.credentials.as_slice()
    }

    pub(crate) fn models(&self) -> &[String] {
        self.models.as_slice()
    }

    pub(crate) fn active_model(&self) -> String {
        self.active.get()
    }

    pub(crate) fn active(&self) -> &ActiveModel {
        &self.active
    }

    /// The number of combinations one call may attempt.
    pub(crate) fn combinations(&self) -> usize {
        self.credentials.len() * self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(registry: &Registry) -> Vec<&str> {
        registry.credentials().iter().map(|c| c.expose_secret()).collect()
    }

    #[test]
    fn override_is_promoted_without_duplicating() {
        let models = ModelPriorityList::new(Some("b"), &["a", "b", "c"]);

        assert_eq!(models.as_slice(), ["b", "a", "c"]);
    }

    #[test]
    fn new_override_is_prepended() {
        let models = ModelPriorityList::new(Some("z"), &["a", "b"]);

        assert_eq!(models.as_slice(), ["z", "a", "b"]);
    }

    #[test]
    fn blank_override_is_ignored() {
        let models = ModelPriorityList::new(Some(" "), &["a", "b"]);

        assert_eq!(models.as_slice(), ["a", "b"]);
    }

    #[test]
    fn builtin_duplicates_are_removed() {
        let models = ModelPriorityList::new(None, &["a", "b", "a"]);

        assert_eq!(models.as_slice(), ["a", "b"]);
    }

    #[test]
    fn empty_slots_are_skipped_in_order() {
        let credentials =
            CredentialSet::from_slots([Some("k1"), None, Some(""), Some("k4")]);

        let registry = Registry::new(credentials, ModelPriorityList::new(None, &["m"]));

        assert_eq!(keys(&registry), ["k1", "k4"]);
    }

    #[test]
    fn duplicate_keys_are_kept() {
        let credentials = CredentialSet::from_slots([Some("k1"), Some("k1")]);

        assert_eq!(credentials.len(), 2);
    }

    #[test]
    fn no_slots_gives_an_empty_set() {
        let credentials = CredentialSet::from_slots::<_, &str>([None, None, None, None]);

        assert!(credentials.is_empty());
    }

    #[test]
    fn active_model_starts_at_first_model() {
        let registry = Registry::new(
            CredentialSet::from_slots([Some("k1"), Some("k2")]),
            ModelPriorityList::new(None, &["m1", "m2"]),
        );

        assert_eq!(registry.active_model(), "m1");
        assert_eq!(registry.combinations(), 4);

        registry.active().set("m2");

        assert_eq!(registry.active_model(), "m2");
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        for key in ["AIzaSySECRETabcd", "abcd", "zq9"] {
            let debug = format!("{:?}", Credential::new(key));

            assert!(!debug.contains(key), "{} leaked in {}", key, debug);
            assert!(debug.contains("REDACTED"));
        }
    }

    #[test]
    fn padded_keys_are_trimmed() {
        let credentials = CredentialSet::from_slots([Some("  k1\n"), Some("   ")]);

        let keys: Vec<&str> = credentials.as_slice().iter().map(|c| c.expose_secret()).collect();

        assert_eq!(keys, ["k1"]);
    }
}
