//! Recovers a JSON document from a model reply.
//!
//! Models asked for JSON often wrap it in a Markdown code fence or surround it
//! with prose. Fences are stripped first; if the rest still does not parse, the
//! span from the first `{` to the last `}` is tried.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("reply does not contain a JSON object")]
    NoObject,
    #[error("reply contains malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn strip_fences(reply: &str) -> String {
    reply.replace("```json", "").replace("```", "")
}

fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;

    if end < start {
        None
    } else {
        Some(&text[start..=end])
    }
}

pub(crate) fn extract_json<T: DeserializeOwned>(reply: &str) -> Result<T, Error> {
    let stripped = strip_fences(reply);
    let stripped = stripped.trim();

    if let Ok(value) = serde_json::from_str(stripped) {
        return Ok(value);
    }

    let span = object_span(stripped).ok_or(Error::NoObject)?;

    Ok(serde_json::from_str(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn plain_json() {
        let value: Value = extract_json(r#"{"careers": ["nurse"]}"#).unwrap();

        assert_eq!(value, json!({ "careers": ["nurse"] }));
    }

    #[test]
    fn fenced_json() {
        let reply = "```json\n{\"score\": 7}\n```\n";

        let value: Value = extract_json(reply).unwrap();

        assert_eq!(value, json!({ "score": 7 }));
    }

    #[test]
    fn json_surrounded_by_prose() {
        let reply = "Sure! Here is your roadmap:\n{\"steps\": [{\"title\": \"learn\"}]}\nGood luck.";

        let value: Value = extract_json(reply).unwrap();

        assert_eq!(value, json!({ "steps": [{ "title": "learn" }] }));
    }

    #[test]
    fn typed_target() {
        #[derive(serde::Deserialize)]
        struct Score {
            score: u8,
        }

        let score: Score = extract_json("```\n{\"score\": 9}\n```").unwrap();

        assert_eq!(score.score, 9);
    }

    #[test]
    fn prose_without_json() {
        let result = extract_json::<Value>("I cannot help with that.");

        assert!(matches!(result, Err(Error::NoObject)));
    }

    #[test]
    fn broken_object() {
        let result = extract_json::<Value>("result: {\"score\": }");

        assert!(matches!(result, Err(Error::Malformed(_))));
    }
}
