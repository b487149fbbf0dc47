use reqwest::{Client, IntoUrl};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::providers::apireq::{ReqwestError, Url};
use crate::providers::GenerationConfig;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        ReqwestError,
    ),

    /// The request body was malformed, or an argument such as the
    /// generation config was rejected. Also returned for an invalid key.
    #[error("{}", .0)]
    BadRequest(ApiErrorPayload),

    /// The API key is missing or invalid.
    #[error("{}", .0)]
    Authentication(ApiErrorPayload),

    /// The key is not allowed to use the model or the project is suspended.
    #[error("{}", .0)]
    PermissionDenied(ApiErrorPayload),

    /// The model does not exist or is not served to this key.
    #[error("{}", .0)]
    NotFound(ApiErrorPayload),

    /// RESOURCE_EXHAUSTED: a rate limit or the daily quota was hit.
    #[error("{}", .0)]
    RateLimit(ApiErrorPayload),

    /// Gemini has an internal issue
    #[error("{}", .0)]
    InternalError(ApiErrorPayload),

    /// UNAVAILABLE: the service is temporarily overloaded
    #[error("{}", .0)]
    ApiOverloaded(ApiErrorPayload),

    /// The service did not finish processing within its deadline
    #[error("{}", .0)]
    DeadlineExceeded(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0)]
    UnknownStatus(ApiErrorPayload),

    /// An error status came back with a body that is not an API error object
    #[error("HTTP {status}: {body}")]
    UnreadableErrorBody { status: u16, body: String },

    /// The prompt was rejected before generation started
    #[error("prompt blocked ({0})")]
    PromptBlocked(String),

    /// A successful response without any text in the first candidate
    #[error("response contained no text (finish reason: {0})")]
    EmptyResponse(String),
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            504 => Error::DeadlineExceeded(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(super) enum Role {
    User,
    Model,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(super) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(super) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub(super) fn new(role: Option<Role>, text: &str) -> Content {
        Content {
            role,
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }

    pub(super) fn user(text: &str) -> Content {
        Content::new(Some(Role::User), text)
    }

    /// A system instruction is a content without a role.
    pub(super) fn instruction(text: &str) -> Content {
        Content::new(None, text)
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/* Structures to serialize :generateContent */

fn is_empty_config(config: &&GenerationConfig) -> bool {
    config.is_empty()
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateContentRequest<'r> {
    pub contents: &'r [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "is_empty_config")]
    pub generation_config: &'r GenerationConfig,
    /// Session options passed through verbatim (`safetySettings`, `tools`, ...)
    #[serde(flatten)]
    pub extra: &'r Map<String, Value>,
}

/* Structures to deseralize :generateContent */

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// The concatenated text of the first candidate.
    pub(super) fn text(&self) -> Result<String, Error> {
        let block_reason = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone());

        if let Some(reason) = block_reason {
            return Err(Error::PromptBlocked(reason));
        }

        let candidate = match self.candidates.first() {
            Some(candidate) => candidate,
            None => return Err(Error::EmptyResponse("no candidates".to_string())),
        };

        let text = candidate
            .content
            .as_ref()
            .map(Content::text)
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate
                .finish_reason
                .clone()
                .unwrap_or_else(|| "unknown".to_string());

            return Err(Error::EmptyResponse(reason));
        }

        Ok(text)
    }
}

/* API Errors */

#[derive(Deserialize, Debug)]
pub(super) struct ApiErrorPayload {
    #[serde(default)]
    code: u16,
    message: String,
    #[serde(default)]
    status: String,
}

impl fmt::Display for ApiErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} {}: {}", self.code, self.status, self.message)
        }
    }
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

pub(crate) const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// A client for the Gemini REST API authenticated with a single key.
pub(super) struct GeminiApi {
    client: Client,
    api_base: Url,
    api_key: SecretString,
}

impl GeminiApi {
    pub(super) fn new<U: IntoUrl>(
        client: Client,
        api_key: SecretString,
        api_base: U,
    ) -> Result<GeminiApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        Ok(GeminiApi {
            client,
            api_base,
            api_key,
        })
    }

    pub(super) async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, Error> {
        let url = self
            .api_base
            .join(&format!("/v1beta/models/{}:generateContent", model))?;

        let res = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret().as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if status.is_success() {
            return res
                .json()
                .await
                .map_err(|e| Error::RequestFailed(e.into()));
        }

        let body = res
            .text()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(err) => Err(Error::from_status(status.as_u16(), err.error)),
            Err(_) => Err(Error::UnreadableErrorBody {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

    async fn send(server: &MockServer, contents: &[Content]) -> Result<GenerateContentResponse, Error> {
        let api = GeminiApi::new(
            Client::new(),
            SecretString::new("key-1".to_string()),
            server.uri(),
        )
        .unwrap();
        let config = GenerationConfig::new();
        let extra = Map::new();

        api.generate_content(
            "gemini-test",
            &GenerateContentRequest {
                contents,
                system_instruction: None,
                generation_config: &config,
                extra: &extra,
            },
        )
        .await
    }

    fn error_body(code: u16, status: &str, message: &str) -> Value {
        json!({ "error": { "code": code, "message": message, "status": status } })
    }

    #[test]
    fn request_serializes_in_wire_format() {
        let contents = [Content::user("hi")];
        let config = GenerationConfig::new().temperature(0.5);
        let mut extra = Map::new();
        extra.insert("safetySettings".to_string(), json!([]));

        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: Some(Content::instruction("be brief")),
            generation_config: &config,
            extra: &extra,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }],
                "systemInstruction": { "parts": [{ "text": "be brief" }] },
                "generationConfig": { "temperature": 0.5 },
                "safetySettings": []
            })
        );
    }

    #[test]
    fn empty_generation_config_is_omitted() {
        let contents = [Content::user("hi")];
        let config = GenerationConfig::new();
        let extra = Map::new();

        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: None,
            generation_config: &config,
            extra: &extra,
        };

        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("generationConfig").is_none());
        assert!(value.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn generate_content_returns_candidate_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "key-1"))
            .and(body_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Hel" }, { "text": "lo" }] },
                    "finishReason": "STOP"
                }],
                "usageMetadata": { "promptTokenCount": 1, "candidatesTokenCount": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = send(&server, &[Content::user("hi")]).await.unwrap();

        assert_eq!(response.text().unwrap(), "Hello");
        assert_eq!(response.usage_metadata.unwrap().candidates_token_count, 2);
    }

    #[tokio::test]
    async fn quota_errors_map_to_rate_limit() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(error_body(
                429,
                "RESOURCE_EXHAUSTED",
                "Quota exceeded for metric",
            )))
            .mount(&server)
            .await;

        let err = send(&server, &[Content::user("hi")]).await.unwrap_err();

        assert!(matches!(err, Error::RateLimit(ref payload) if payload.status == "RESOURCE_EXHAUSTED"));
        assert_eq!(
            err.to_string(),
            "429 RESOURCE_EXHAUSTED: Quota exceeded for metric"
        );
    }

    #[tokio::test]
    async fn invalid_key_maps_to_bad_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(error_body(
                400,
                "INVALID_ARGUMENT",
                "API key not valid. Please pass a valid API key.",
            )))
            .mount(&server)
            .await;

        let err = send(&server, &[Content::user("hi")]).await.unwrap_err();

        assert!(matches!(err, Error::BadRequest(ref payload) if payload.code == 400));
    }

    #[tokio::test]
    async fn non_json_error_body_is_preserved() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = send(&server, &[Content::user("hi")]).await.unwrap_err();

        assert!(matches!(
            err,
            Error::UnreadableErrorBody { status: 502, ref body } if body == "bad gateway"
        ));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();

        assert!(matches!(response.text(), Err(Error::PromptBlocked(reason)) if reason == "SAFETY"));
    }

    #[test]
    fn candidate_without_text_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }]
        }))
        .unwrap();

        assert!(matches!(response.text(), Err(Error::EmptyResponse(reason)) if reason == "MAX_TOKENS"));
    }
}
