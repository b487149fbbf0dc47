use nu_ansi_term::AnsiGenericString;
use reedline::{PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, PromptViMode};
use std::borrow::Cow;

use crate::color::{self, MaybePaint};

const USER_PROMPT: &str = "[you] ";
const USER_VI_NORMAL_PROMPT: &str = "[you:] ";
const COMPLETION_MARKER: &str = "[/] ";
const USER_MULTILINE_PROMPT: &str = "::: ";

fn paint_user(text: &'static str) -> AnsiGenericString<'static, str> {
    color::USER_PROMPT.maybe_paint(text)
}

pub(crate) fn model_prompt(model_name: &str) -> String {
    let prompt_text = format!("[{}] ", model_name);

    color::MODEL_PROMPT.maybe_paint(prompt_text).to_string()
}

pub(crate) fn user_prompt() -> AnsiGenericString<'static, str> {
    paint_user(USER_PROMPT)
}

pub(crate) fn completion_marker() -> AnsiGenericString<'static, str> {
    paint_user(COMPLETION_MARKER)
}

/// The prompt strings are painted once, up front.
pub(crate) struct Prompt {
    user_prompt: String,
    user_vi_normal_prompt: String,
    user_multiline_prompt: String,
}

impl Default for Prompt {
    fn default() -> Self {
        Prompt {
            user_prompt: user_prompt().to_string(),
            user_vi_normal_prompt: paint_user(USER_VI_NORMAL_PROMPT).to_string(),
            user_multiline_prompt: paint_user(USER_MULTILINE_PROMPT).to_string(),
        }
    }
}

impl reedline::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, prompt_mode: PromptEditMode) -> Cow<str> {
        match prompt_mode {
            PromptEditMode::Vi(PromptViMode::Normal) => Cow::Borrowed(&self.user_vi_normal_prompt),
            _ => Cow::Borrowed(&self.user_prompt),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed(&self.user_multiline_prompt)
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };

        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColorMode;

    #[test]
    fn model_prompt_names_the_model() {
        color::configure_color(ColorMode::Off);

        assert_eq!(model_prompt("gemini-2.0-flash"), "[gemini-2.0-flash] ");
    }
}
