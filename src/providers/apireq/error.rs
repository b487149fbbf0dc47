//! Wrapper around Reqwest's error type to facilitate exclusive matching

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    ConnectFailed,
    TimedOut,
    /// The request could not be built or its body could not be written.
    RequestInvalid,
    /// The response body could not be read or decoded.
    BodyUnreadable,
    RedirectPolicyViolated,
    UnknownReqwestError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_connect() {
            ErrorKind::ConnectFailed
        } else if err.is_builder() || err.is_request() {
            ErrorKind::RequestInvalid
        } else if err.is_decode() || err.is_body() {
            ErrorKind::BodyUnreadable
        } else if err.is_redirect() {
            ErrorKind::RedirectPolicyViolated
        } else {
            ErrorKind::UnknownReqwestError
        };

        Error { kind, source: err }
    }
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ConnectFailed => write!(f, "connection failed"),
            ErrorKind::TimedOut => write!(f, "timed out"),
            ErrorKind::RequestInvalid => write!(f, "request could not be sent"),
            ErrorKind::BodyUnreadable => write!(f, "response body could not be read"),
            ErrorKind::RedirectPolicyViolated => write!(f, "redirect policy violated"),
            ErrorKind::UnknownReqwestError => write!(f, "unknown reqwest error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
