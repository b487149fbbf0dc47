//! The fallback engine runs every request against the (model, key) matrix of a
//! [`Registry`] until one combination succeeds.
//!
//! Combinations are tried model-major, key-minor: every key is tried with the
//! first model before the second model is touched. Keys are interchangeable
//! quota pools, while models differ in speed and capability, so a slower model
//! is only used once the preferred one has failed with every key.
//!
//! ```text
//! (m1, k1) (m1, k2) (m2, k1) (m2, k2) ...
//! ```
//!
//! Attempts run one at a time and stop at the first success. A failure of any
//! kind moves on to the next combination without delay; there is no
//! distinction between errors worth retrying and errors that are not. Each
//! attempt is bounded by a timeout, and running out of time counts as a failure
//! like any other. When every combination has failed the caller gets a single
//! [`Error::AllCombinationsExhausted`] carrying the last failure.
//!
//! Every call starts again from the top of the matrix. The registry's active
//! model is updated after a fallback succeeds but is never used to skip ahead.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::providers::{
    self, ChatConfig, ErrorKind, GenerationConfig, GenerativeProvider, ModelParams,
};
use crate::registry::{Credential, Registry};

pub(crate) const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Elicits a short, predictable reply.
pub(crate) const PING_PROMPT: &str = "Reply with only: OK";

/// Provider errors can be very long; only this many characters are logged.
const LOGGED_ERROR_CHARS: usize = 80;

/// The failure of a single (model, key) attempt.
#[derive(Error, Debug)]
#[error("key #{key_number} with {model} failed: {source}")]
pub(crate) struct CombinationFailed {
    pub model: String,
    /// One-based position of the key.
    pub key_number: usize,
    #[source]
    pub source: providers::Error,
}

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// There are no keys to try. Nothing was attempted.
    #[error("no Gemini API keys are configured")]
    NoCredentialsConfigured,
    /// There are no models to try. Nothing was attempted.
    #[error("no models are configured")]
    NoModelsConfigured,
    /// Every combination failed.
    #[error("all {attempts} model/key combinations failed, last: {last}")]
    AllCombinationsExhausted {
        attempts: usize,
        #[source]
        last: CombinationFailed,
    },
}

/// A successful result and the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Answered<T> {
    pub value: T,
    pub model: String,
}

fn truncate(message: &str, max_chars: usize) -> &str {
    match message.char_indices().nth(max_chars) {
        Some((end, _)) => &message[..end],
        None => message,
    }
}

pub(crate) struct FallbackEngine {
    registry: Registry,
    provider: Box<dyn GenerativeProvider>,
    attempt_timeout: Duration,
}

impl FallbackEngine {
    pub(crate) fn new(registry: Registry, provider: Box<dyn GenerativeProvider>) -> FallbackEngine {
        FallbackEngine {
            registry,
            provider,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub(crate) fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> FallbackEngine {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn provider(&self) -> &dyn GenerativeProvider {
        self.provider.as_ref()
    }

    /// Runs `attempt` for each (key, model) pair in priority order and
    /// returns the first success.
    pub(crate) async fn try_all_combinations<T, F, Fut>(&self, attempt: F) -> Result<T, Error>
    where
        F: FnMut(Credential, String) -> Fut,
        Fut: Future<Output = Result<T, providers::Error>>,
    {
        self.answer_from_any_combination(attempt)
            .await
            .map(|answered| answered.value)
    }

    /// Like [`FallbackEngine::try_all_combinations`], but also reports which
    /// model answered.
    pub(crate) async fn answer_from_any_combination<T, F, Fut>(
        &self,
        mut attempt: F,
    ) -> Result<Answered<T>, Error>
    where
        F: FnMut(Credential, String) -> Fut,
        Fut: Future<Output = Result<T, providers::Error>>,
    {
        let credentials = self.registry.credentials();
        let models = self.registry.models();

        if credentials.is_empty() {
            return Err(Error::NoCredentialsConfigured);
        }

        let total = credentials.len() * models.len();
        let mut attempts = 0;
        let mut last = None;

        for (model_index, model) in models.iter().enumerate() {
            for (key_index, credential) in credentials.iter().enumerate() {
                attempts += 1;

                let pending = attempt(credential.clone(), model.clone());

                let outcome = match tokio::time::timeout(self.attempt_timeout, pending).await {
                    Ok(outcome) => outcome,
                    Err(elapsed) => Err(providers::Error::from_source(
                        ErrorKind::TimedOut,
                        Box::new(elapsed),
                    )),
                };

                let err = match outcome {
                    Ok(value) => {
                        if model_index > 0 || key_index > 0 {
                            self.registry.active().set(model);

                            info!(key = key_index + 1, model = %model, "fallback succeeded");
                        }

                        return Ok(Answered {
                            value,
                            model: model.clone(),
                        });
                    }
                    Err(err) => err,
                };

                let remaining = total - attempts;
                let message = err.to_string();

                warn!(
                    key = key_index + 1,
                    model = %model,
                    remaining,
                    error = truncate(&message, LOGGED_ERROR_CHARS),
                    "{}",
                    if remaining > 0 {
                        "combination failed, trying next"
                    } else {
                        "combination failed, none left"
                    }
                );

                last = Some(CombinationFailed {
                    model: model.clone(),
                    key_number: key_index + 1,
                    source: err,
                });
            }
        }

        match last {
            Some(last) => Err(Error::AllCombinationsExhausted { attempts, last }),
            None => Err(Error::NoModelsConfigured),
        }
    }

    /// Generates a reply to a single prompt and returns its raw text.
    pub(crate) async fn generate(
        &self,
        prompt: &str,
        generation_config: &GenerationConfig,
    ) -> Result<String, Error> {
        let provider = self.provider();

        self.try_all_combinations(move |credential, model| async move {
            let params = ModelParams {
                model,
                system_instruction: None,
                generation_config: generation_config.clone(),
            };

            let model = provider.generative_model(&credential, params)?;

            model.generate_content(prompt).await
        })
        .await
    }

    /// Sends `user_message` into a fresh chat session started from
    /// `chat_config`. Nothing is kept between calls, so the config has to
    /// carry the whole history.
    pub(crate) async fn chat_send(
        &self,
        chat_config: &ChatConfig,
        user_message: &str,
    ) -> Result<String, Error> {
        self.chat_send_with_model(chat_config, user_message)
            .await
            .map(|answered| answered.value)
    }

    /// [`FallbackEngine::chat_send`] that also reports the model that replied.
    pub(crate) async fn chat_send_with_model(
        &self,
        chat_config: &ChatConfig,
        user_message: &str,
    ) -> Result<Answered<String>, Error> {
        let provider = self.provider();
        let (system_instruction, session_options) = chat_config.split();

        self.answer_from_any_combination(move |credential, model| async move {
            let params = ModelParams {
                model,
                system_instruction: system_instruction.map(str::to_string),
                generation_config: GenerationConfig::new(),
            };

            let model = provider.generative_model(&credential, params)?;

            let mut session = model.start_chat(session_options.clone());

            session.send_message(user_message).await
        })
        .await
    }

    /// Measures how long a trivial generation takes.
    pub(crate) async fn ping(&self) -> Result<Duration, Error> {
        let started = Instant::now();

        self.generate(PING_PROMPT, &GenerationConfig::new()).await?;

        Ok(started.elapsed())
    }
}
