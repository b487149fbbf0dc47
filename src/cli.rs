use std::io::{self, IsTerminal, Read};

use crate::config::Config;
use crate::die;
use crate::fallback::FallbackEngine;
use crate::providers::gemini::GeminiProvider;
use crate::registry::populate::populated_registry;
use crate::RequestedColorMode;

pub(crate) mod bench;
pub(crate) mod chat;
pub(crate) mod generate;
pub(crate) mod ping;
pub(crate) mod status;
mod table;

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used
    /// If the user has specified a preference, this is honored. This preference
    /// can be specified through the command line or the "NO_COLOR" environment
    /// variable If the user hasn't stated a preference, color is enabled if the
    /// output is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// Builds the engine every command talks through.
pub(crate) fn fallback_engine(config: &Config) -> FallbackEngine {
    let registry = populated_registry(&config.gemini);

    let provider = match GeminiProvider::new(config.gemini.api_base()) {
        Ok(provider) => provider,
        Err(err) => die!(
            "invalid Gemini API base \"{}\": {}",
            config.gemini.api_base(),
            err
        ),
    };

    FallbackEngine::new(registry, Box::new(provider))
        .with_attempt_timeout(config.gemini.attempt_timeout())
}

/// Takes the prompt from the argument if present, standard input otherwise.
pub(crate) fn read_prompt(prompt: Option<&str>) -> String {
    if let Some(prompt) = prompt {
        return prompt.to_string();
    }

    if io::stdin().is_terminal() {
        die!("no prompt given, pass one as an argument or through standard input");
    }

    let mut buf = String::new();

    if let Err(err) = io::stdin().read_to_string(&mut buf) {
        die!("failed to read the prompt from standard input: {}", err);
    }

    buf
}
