use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fallback::DEFAULT_ATTEMPT_TIMEOUT;
use crate::providers::gemini::DEFAULT_API_BASE;
use crate::warn;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to reserialize config: {0}")]
    Reserialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Keybindings {
    #[default]
    Emacs,
    Vi,
}

/// Written back out only to find unknown keys.
fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub(crate) struct Gemini {
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub api_key_2: Option<SecretString>,
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub api_key_3: Option<SecretString>,
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub api_key_4: Option<SecretString>,
    /// Tried before the built-in models.
    pub model: Option<String>,
    pub api_base: Option<String>,
    /// Seconds a single model/key attempt may take.
    pub attempt_timeout: Option<u64>,
}

impl Gemini {
    /// The configured keys, primary first.
    pub(crate) fn api_key_slots(&self) -> [Option<&SecretString>; 4] {
        [
            self.api_key.as_ref(),
            self.api_key_2.as_ref(),
            self.api_key_3.as_ref(),
            self.api_key_4.as_ref(),
        ]
    }

    pub(crate) fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub(crate) fn attempt_timeout(&self) -> Duration {
        match self.attempt_timeout {
            Some(0) | None => DEFAULT_ATTEMPT_TIMEOUT,
            Some(secs) => Duration::from_secs(secs),
        }
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Config {
    pub editor: Option<String>,
    #[serde(default)]
    pub keybindings: Keybindings,
    #[serde(default)]
    pub gemini: Gemini,
}

fn get_config_path() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/careerramp/config.toml", ".careerramp.toml"];

        for path in USER_PATHS {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/careerramp.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a str>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extra_fields_helper(path, user_value, config_value, extra)
            }
            (_, Some(_)) => {}
            (_, None) => extra.push(path.join(".")),
        }

        path.pop();
    }
}

/// Dotted paths of keys in `raw_config` that `config` does not know about.
fn extra_fields(config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = toml::from_str(raw_config)?;
    let config: toml::Table = toml::from_str(&toml::to_string(config)?)?;

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &config, &mut extra);

    Ok(extra)
}

fn parse_config(raw_config: &str) -> Result<Config, Error> {
    let config: Config = toml::from_str(raw_config)?;

    for key in extra_fields(&config, raw_config)? {
        warn!("config contains extraneous key \"{}\", ignoring", key);
    }

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config, Error> {
    let raw_config = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&raw_config)
}

/// Reads `config`, or the first config found in the default locations. With
/// no config anywhere the defaults are used.
pub(crate) fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    match config.or_else(get_config_path) {
        Some(path) => read_config_file(&path),
        None => Ok(Config::default()),
    }
}
