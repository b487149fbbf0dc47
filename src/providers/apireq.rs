//! A utility module with helpers for making API requests.

mod error;
mod provider;

pub(crate) use error::Error as ReqwestError;
pub(crate) use reqwest::Url;
