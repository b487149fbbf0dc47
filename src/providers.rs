//! Traits and type definitions for talking to a generative model API.
//!
//! The interface the fallback engine drives is split into three handles that
//! mirror how a generation request is scoped:
//!
//! - [`GenerativeProvider`] opens a model handle for one credential.
//! - [`GenerativeModel`] is bound to a (credential, model, system instruction,
//!   generation config) tuple and either generates content from a single prompt
//!   or starts a chat session.
//! - [`ChatSession`] holds the turn history of one conversation and sends the
//!   next user message into it.
//!
//! Handles are cheap and never cached. Every attempt made by the engine opens
//! fresh ones, so nothing leaks from a failed attempt into the next.
//!
//! ## Error Handling
//!
//! API errors are wrapped in [`Error`], and the [`ErrorKind`] enum gives the
//! category. The engine does not branch on the kind (every failure moves it to
//! the next combination) but the category is what ends up in the logs.

mod apireq;
pub(crate) mod gemini;
mod options;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

pub(crate) use self::options::{ChatConfig, GenerationConfig, ModelParams, SessionOptions};
use crate::registry::Credential;

/// What went wrong with a provider call, in terms independent of any one API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// No connection could be made (DNS, refused, unreachable).
    Connection,
    /// The request or the attempt as a whole ran out of time.
    TimedOut,
    /// The key was rejected or may not use the model.
    Authentication,
    /// Rate limited or out of quota for this key.
    ExcessUsage,
    /// The service is temporarily unavailable.
    ApiOverloaded,
    /// The model does not exist or is not served to this key.
    NotFound,
    /// The request was rejected as malformed.
    BadRequest,
    /// The service failed while handling the request.
    InternalError,
    /// The reply could not be read or carried no usable text.
    UnexpectedResponse,
    /// A safety filter blocked the prompt or the reply.
    Blocked,
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "could not connect",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::Authentication => "key rejected",
            ErrorKind::ExcessUsage => "rate limited or out of quota",
            ErrorKind::ApiOverloaded => "service overloaded",
            ErrorKind::NotFound => "model not found",
            ErrorKind::BadRequest => "request rejected",
            ErrorKind::InternalError => "provider internal error",
            ErrorKind::UnexpectedResponse => "unexpected response",
            ErrorKind::Blocked => "blocked by a safety filter",
            ErrorKind::UnspecifiedError => "provider error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message(), source),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// A trait implemented by all generation providers.
pub(crate) trait GenerativeProvider: Send + Sync {
    /// A short name used in logs and status output.
    fn name(&self) -> &'static str;

    /// Opens a model handle authenticated with `credential`.
    fn generative_model(
        &self,
        credential: &Credential,
        params: ModelParams,
    ) -> Result<Box<dyn GenerativeModel>, Error>;
}

/// A model bound to a single credential.
#[async_trait]
pub(crate) trait GenerativeModel: Send + Sync {
    /// Submits a single prompt and returns the text of the reply.
    async fn generate_content(&self, prompt: &str) -> Result<String, Error>;

    /// Starts a new chat session seeded with `options`. No request is made
    /// until the first message is sent.
    fn start_chat(&self, options: SessionOptions) -> Box<dyn ChatSession + '_>;
}

/// A multi-turn conversation with a model.
#[async_trait]
pub(crate) trait ChatSession: Send {
    /// Sends `message` and returns the model's reply. On success both turns
    /// are appended to the session history.
    async fn send_message(&mut self, message: &str) -> Result<String, Error>;
}
