use serde::Serialize;

use super::table::{IntoTable, Table};

use super::fallback_engine;
use crate::config::Config;
use crate::registry::Registry;
use crate::{ListingFormat, StatusArgs};

#[derive(Serialize, Debug, PartialEq)]
struct Model {
    model: String,
    priority: usize,
    active: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct Status {
    provider: &'static str,
    active_model: String,
    keys: usize,
    combinations: usize,
    models: Vec<Model>,
}

impl Status {
    fn new(provider: &'static str, registry: &Registry) -> Status {
        let active_model = registry.active_model();

        let models = registry
            .models()
            .iter()
            .enumerate()
            .map(|(i, model)| Model {
                model: model.clone(),
                priority: i + 1,
                active: *model == active_model,
            })
            .collect();

        Status {
            provider,
            active_model,
            keys: registry.credentials().len(),
            combinations: registry.combinations(),
            models,
        }
    }
}

impl From<Status> for Table {
    fn from(value: Status) -> Self {
        let mut tab = Table::new(["PRIORITY", "MODEL", "ACTIVE"]);

        for model in value.models {
            tab.add_row(vec![
                model.priority.to_string(),
                model.model,
                if model.active { "*" } else { "-" }.to_string(),
            ]);
        }

        tab
    }
}

fn format_output(status: Status, format: ListingFormat) -> String {
    match format {
        ListingFormat::Json => format!("{:#}", serde_json::json!(status)),
        ListingFormat::Table => {
            let summary = format!(
                "{} API key(s), {} combination(s) per request",
                status.keys, status.combinations
            );

            format!("{}\n{}\n", status.into_table(), summary)
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = status.into_table();

            tab.print_header(false);

            tab.to_string()
        }
    }
}

pub(crate) fn status_cmd(config: &Config, args: &StatusArgs) {
    let engine = fallback_engine(config);

    let status = Status::new(engine.provider().name(), engine.registry());

    print!("{}", format_output(status, args.format));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CredentialSet, ModelPriorityList};

    fn status() -> Status {
        let registry = Registry::new(
            CredentialSet::from_slots([Some("k1"), None, Some("k3")]),
            ModelPriorityList::new(Some("m2"), &["m1", "m2"]),
        );

        registry.active().set("m1");

        Status::new("gemini", &registry)
    }

    #[test]
    fn active_model_is_marked() {
        let status = status();

        assert_eq!(status.keys, 2);
        assert_eq!(status.combinations, 4);
        assert_eq!(
            status.models,
            [
                Model {
                    model: "m2".to_string(),
                    priority: 1,
                    active: false,
                },
                Model {
                    model: "m1".to_string(),
                    priority: 2,
                    active: true,
                },
            ]
        );
    }

    #[test]
    fn headerless_table() {
        assert_eq!(
            format_output(status(), ListingFormat::HeaderlessTable),
            "1  m2  -\n2  m1  *\n"
        );
    }

    #[test]
    fn json_status() {
        let output: serde_json::Value =
            serde_json::from_str(&format_output(status(), ListingFormat::Json)).unwrap();

        assert_eq!(output["active_model"], "m1");
        assert_eq!(output["keys"], 2);
        assert_eq!(output["models"][0]["model"], "m2");
    }
}
