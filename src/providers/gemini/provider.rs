use async_trait::async_trait;
use reqwest::{Client, IntoUrl};
use serde_json::{Map, Value};
use tracing::debug;

use super::api::{self, Content, GenerateContentRequest};
use crate::chat::{Message, Role};
use crate::providers::apireq::Url;
use crate::providers::{
    ChatSession, Error, ErrorKind, GenerationConfig, GenerativeModel, GenerativeProvider,
    ModelParams, SessionOptions,
};
use crate::registry::Credential;

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        if let api::Error::RequestFailed(err) = value {
            return err.into();
        }

        let kind = match &value {
            api::Error::Authentication(_) | api::Error::PermissionDenied(_) => {
                ErrorKind::Authentication
            }
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_) => ErrorKind::BadRequest,
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            api::Error::DeadlineExceeded(_) => ErrorKind::TimedOut,
            api::Error::PromptBlocked(_) => ErrorKind::Blocked,
            api::Error::EmptyResponse(_) => ErrorKind::UnexpectedResponse,
            api::Error::UnknownStatus(_)
            | api::Error::UnreadableErrorBody { .. }
            | api::Error::RequestFailed(_) => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}

impl From<Role> for api::Role {
    fn from(value: Role) -> Self {
        match value {
            Role::User => api::Role::User,
            Role::Model => api::Role::Model,
        }
    }
}

impl From<&Message> for Content {
    fn from(value: &Message) -> Self {
        Content::new(Some(value.role.into()), &value.content)
    }
}

/// The Gemini generative language API.
///
/// One HTTP connection pool is shared by every key; a key only changes the
/// header a request carries.
pub(crate) struct GeminiProvider {
    client: Client,
    api_base: Url,
}

impl GeminiProvider {
    pub(crate) fn new<U: IntoUrl>(api_base: U) -> Result<GeminiProvider, Error> {
        let api_base = api_base
            .into_url()
            .map_err(|e| Error::from(api::Error::InvalidApiBase(e)))?;

        Ok(GeminiProvider {
            client: Client::new(),
            api_base,
        })
    }
}

impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generative_model(
        &self,
        credential: &Credential,
        params: ModelParams,
    ) -> Result<Box<dyn GenerativeModel>, Error> {
        let api = api::GeminiApi::new(
            self.client.clone(),
            credential.secret().clone(),
            self.api_base.clone(),
        )?;

        Ok(Box::new(GeminiModel { api, params }))
    }
}

struct GeminiModel {
    api: api::GeminiApi,
    params: ModelParams,
}

impl GeminiModel {
    async fn request(
        &self,
        contents: &[Content],
        generation_config: &GenerationConfig,
        extra: &Map<String, Value>,
    ) -> Result<String, Error> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: self
                .params
                .system_instruction
                .as_deref()
                .map(Content::instruction),
            generation_config,
            extra,
        };

        let response = self
            .api
            .generate_content(&self.params.model, &request)
            .await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                model = %self.params.model,
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                "gemini usage"
            );
        }

        Ok(response.text()?)
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate_content(&self, prompt: &str) -> Result<String, Error> {
        let contents = [Content::user(prompt)];

        self.request(&contents, &self.params.generation_config, &Map::new())
            .await
    }

    fn start_chat(&self, options: SessionOptions) -> Box<dyn ChatSession + '_> {
        Box::new(GeminiChatSession {
            model: self,
            options,
        })
    }
}

/// The REST API is stateless, so a session is its history replayed on
/// every message.
struct GeminiChatSession<'m> {
    model: &'m GeminiModel,
    options: SessionOptions,
}

#[async_trait]
impl<'m> ChatSession for GeminiChatSession<'m> {
    async fn send_message(&mut self, message: &str) -> Result<String, Error> {
        let mut contents: Vec<Content> = self.options.history.iter().map(Content::from).collect();

        contents.push(Content::user(message));

        // Options given to the session take precedence over the model's.
        let generation_config = if self.options.generation_config.is_empty() {
            &self.model.params.generation_config
        } else {
            &self.options.generation_config
        };

        let reply = self
            .model
            .request(&contents, generation_config, &self.options.extra)
            .await?;

        self.options.history.push(Message::user(message.to_string()));
        self.options.history.push(Message::model(reply.clone()));

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn chat_session_replays_history_with_system_instruction() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "k2"))
            .and(body_json(json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "hello" }] },
                    { "role": "model", "parts": [{ "text": "hi there" }] },
                    { "role": "user", "parts": [{ "text": "what next?" }] }
                ],
                "systemInstruction": { "parts": [{ "text": "You are a career mentor" }] },
                "generationConfig": { "temperature": 0.7 }
            })))
            .respond_with(reply("learn Rust"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new(server.uri()).unwrap();

        let model = provider
            .generative_model(
                &Credential::new("k2"),
                ModelParams {
                    model: "gemini-test".to_string(),
                    system_instruction: Some("You are a career mentor".to_string()),
                    generation_config: GenerationConfig::new(),
                },
            )
            .unwrap();

        let mut session = model.start_chat(SessionOptions {
            history: vec![
                Message::user("hello".to_string()),
                Message::model("hi there".to_string()),
            ],
            generation_config: GenerationConfig::new().temperature(0.7),
            extra: Map::new(),
        });

        let answer = session.send_message("what next?").await.unwrap();

        assert_eq!(answer, "learn Rust");
    }

    #[tokio::test]
    async fn rate_limited_key_is_excess_usage() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new(server.uri()).unwrap();

        let model = provider
            .generative_model(&Credential::new("k1"), ModelParams::new("gemini-test"))
            .unwrap();

        let err = model.generate_content("hi").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExcessUsage);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        // Nothing listens on the discard port.
        let provider = GeminiProvider::new("http://127.0.0.1:9").unwrap();

        let model = provider
            .generative_model(&Credential::new("k1"), ModelParams::new("gemini-test"))
            .unwrap();

        let err = model.generate_content("hi").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
