//! Times each model with the primary key, one at a time.
//!
//! Requests go straight to the provider so that every model is measured on its
//! own; a failure is reported instead of falling back.

use std::time::{Duration, Instant};

use super::fallback_engine;
use super::table::{IntoTable, Table};
use crate::color::{self, MaybePaint};
use crate::config::Config;
use crate::providers::{self, GenerativeProvider, ModelParams};
use crate::registry::populate::MODEL_ENV_VAR;
use crate::registry::Credential;
use crate::{die, BenchArgs};

const BENCH_PROMPT: &str = "Say \"hello\" in exactly 3 words.";

struct Outcome {
    model: String,
    result: Result<(Duration, String), providers::Error>,
}

struct Results(Vec<Outcome>);

impl Results {
    fn fastest(&self) -> Option<&Outcome> {
        self.0
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok((elapsed, _)) => Some((elapsed, outcome)),
                Err(_) => None,
            })
            .min_by_key(|(elapsed, _)| **elapsed)
            .map(|(_, outcome)| outcome)
    }
}

impl From<&Results> for Table {
    fn from(value: &Results) -> Self {
        let mut tab = Table::new(["MODEL", "RESULT", "MS", "REPLY"]);

        for outcome in &value.0 {
            let row = match &outcome.result {
                Ok((elapsed, reply)) => vec![
                    outcome.model.clone(),
                    "ok".to_string(),
                    elapsed.as_millis().to_string(),
                    reply.trim().replace('\n', " "),
                ],
                Err(err) => vec![
                    outcome.model.clone(),
                    "failed".to_string(),
                    "-".to_string(),
                    err.to_string(),
                ],
            };

            tab.add_row(row);
        }

        tab
    }
}

async fn bench_model(
    provider: &dyn GenerativeProvider,
    credential: &Credential,
    model: &str,
) -> Result<(Duration, String), providers::Error> {
    let started = Instant::now();

    let reply = provider
        .generative_model(credential, ModelParams::new(model))?
        .generate_content(BENCH_PROMPT)
        .await?;

    Ok((started.elapsed(), reply))
}

async fn bench_models(
    provider: &dyn GenerativeProvider,
    credential: &Credential,
    models: &[String],
    pause: Duration,
) -> Results {
    let mut outcomes = Vec::with_capacity(models.len());

    for (i, model) in models.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }

        let result = bench_model(provider, credential, model).await;

        outcomes.push(Outcome {
            model: model.clone(),
            result,
        });
    }

    Results(outcomes)
}

pub(crate) async fn bench_cmd(config: &Config, args: &BenchArgs) {
    let engine = fallback_engine(config);

    let credential = match engine.registry().credentials().first() {
        Some(credential) => credential,
        None => die!("no Gemini API keys are configured"),
    };

    let results = bench_models(
        engine.provider(),
        credential,
        engine.registry().models(),
        Duration::from_millis(args.pause_ms),
    )
    .await;

    print!("{}", (&results).into_table());

    let fastest = match results.fastest() {
        Some(fastest) => fastest,
        None => die!("no model answered"),
    };

    println!(
        "\nfastest: {}, set {}={} to prefer it",
        color::MODEL_PROMPT.maybe_paint(fastest.model.as_str()),
        MODEL_ENV_VAR,
        fastest.model
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::gemini::GeminiProvider;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn each_model_is_tried_once_with_the_given_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/good:generateContent"))
            .and(header("x-goog-api-key", "k1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Hello there, friend" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/retired:generateContent"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "model not found", "status": "NOT_FOUND" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new(server.uri()).unwrap();

        let results = bench_models(
            &provider,
            &Credential::new("k1"),
            &["retired".to_string(), "good".to_string()],
            Duration::ZERO,
        )
        .await;

        assert_eq!(results.0.len(), 2);
        assert_eq!(
            results.0[0].result.as_ref().unwrap_err().kind(),
            providers::ErrorKind::NotFound
        );
        assert_eq!(results.fastest().unwrap().model, "good");
    }

    #[test]
    fn failed_models_are_listed() {
        let results = Results(vec![Outcome {
            model: "retired".to_string(),
            result: Err(providers::Error::from_kind(providers::ErrorKind::NotFound)),
        }]);

        assert!(results.fastest().is_none());
        assert!((&results)
            .into_table()
            .to_string()
            .contains("retired  failed  -"));
    }
}
