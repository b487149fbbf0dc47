use crate::cli::ColorMode;
use lazy_static::lazy_static;
use nu_ansi_term::{AnsiGenericString, Color, Style};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};

lazy_static! {
    pub(crate) static ref USER_PROMPT: Style = Color::Blue.bold();
    pub(crate) static ref MODEL_PROMPT: Style = Color::Green.bold();
    pub(crate) static ref USER_TEXT: Style = Color::Default.bold();
    pub(crate) static ref ERROR_INDICATOR: Style = Color::Red.bold();
    pub(crate) static ref WARNING_INDICATOR: Style = Color::Yellow.bold();
    pub(crate) static ref MESSAGE_TEXT: Style = Color::Default.bold();
}

static USE_COLOR: AtomicBool = AtomicBool::new(true);

pub(crate) fn configure_color(cmode: ColorMode) {
    USE_COLOR.store(matches!(cmode, ColorMode::On), Ordering::Relaxed);
}

pub(crate) fn color_mode() -> ColorMode {
    if USE_COLOR.load(Ordering::Relaxed) {
        ColorMode::On
    } else {
        ColorMode::Off
    }
}

/// Styles text only while color output is enabled.
pub(crate) trait MaybePaint {
    fn maybe_paint<'a, I: Into<Cow<'a, str>>>(self, input: I) -> AnsiGenericString<'a, str>;
}

impl MaybePaint for Style {
    fn maybe_paint<'a, I: Into<Cow<'a, str>>>(self, input: I) -> AnsiGenericString<'a, str> {
        match color_mode() {
            ColorMode::On => self.paint(input),
            ColorMode::Off => AnsiGenericString::from(input.into()),
        }
    }
}
