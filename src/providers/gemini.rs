//! An umbrella module for the Gemini provider

mod api;
mod models;
mod provider;

pub(crate) use self::api::DEFAULT_API_BASE;
pub(crate) use self::models::BUILTIN_MODELS;
pub(crate) use self::provider::GeminiProvider;
