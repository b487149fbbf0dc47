use crate::color;

/// Renders everything the user types in the user text style.
pub(crate) struct Highlighter;

impl reedline::Highlighter for Highlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> reedline::StyledText {
        reedline::StyledText {
            buffer: vec![(*color::USER_TEXT, line.to_string())],
        }
    }
}
