use serde_json::Value;

use super::{fallback_engine, read_prompt};
use crate::config::Config;
use crate::die;
use crate::json_reply::extract_json;
use crate::providers::GenerationConfig;
use crate::GenerateArgs;

fn generation_config(args: &GenerateArgs) -> GenerationConfig {
    let mut config = GenerationConfig::new();

    if let Some(tokens) = args.max_output_tokens {
        config = config.max_output_tokens(tokens);
    }

    if let Some(temperature) = args.temperature {
        config = config.temperature(temperature);
    }

    config
}

pub(crate) async fn generate_cmd(config: &Config, args: &GenerateArgs) {
    let prompt = read_prompt(args.prompt.as_deref());

    let engine = fallback_engine(config);

    let reply = match engine.generate(&prompt, &generation_config(args)).await {
        Ok(reply) => reply,
        Err(err) => die!("generation failed: {}", err),
    };

    if !args.json {
        println!("{}", reply);
        return;
    }

    match extract_json::<Value>(&reply) {
        Ok(value) => println!("{:#}", value),
        Err(err) => die!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[test]
    fn flags_become_generation_options() {
        let args = GenerateArgs::parse_from([
            "generate",
            "--max-output-tokens",
            "256",
            "--temperature",
            "0.2",
            "hi",
        ]);

        let config = generation_config(&args);

        assert_eq!(config.get("maxOutputTokens"), Some(&json!(256)));
        assert_eq!(config.get("temperature"), Some(&json!(0.2)));
        assert_eq!(args.prompt.as_deref(), Some("hi"));
    }

    #[test]
    fn no_flags_no_options() {
        let args = GenerateArgs::parse_from(["generate"]);

        assert!(generation_config(&args).is_empty());
    }
}
