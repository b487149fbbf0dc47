use nu_ansi_term::Style;
use std::fmt;

use crate::color::{self, MaybePaint};

pub const DEFAULT_EXIT_CODE: i32 = 1;

fn fmt_labeled(f: &mut fmt::Formatter<'_>, label: Style, name: &str, text: &str) -> fmt::Result {
    write!(
        f,
        "{} {}",
        label.maybe_paint(name),
        color::MESSAGE_TEXT.maybe_paint(text)
    )
}

pub(crate) fn fmt_error<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, text: S) -> fmt::Result {
    fmt_labeled(f, *color::ERROR_INDICATOR, "error:", text.as_ref())
}

pub(crate) fn fmt_warn<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, text: S) -> fmt::Result {
    fmt_labeled(f, *color::WARNING_INDICATOR, "warning:", text.as_ref())
}

struct Error<'a>(&'a str);

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_error(f, self.0)
    }
}

struct Warning<'a>(&'a str);

impl fmt::Display for Warning<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_warn(f, self.0)
    }
}

pub(crate) fn error_internal(text: &str) {
    eprintln!("{}", Error(text));
}

pub(crate) fn warn_internal(text: &str) {
    eprintln!("{}", Warning(text));
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColorMode;

    #[test]
    fn plain_messages_without_color() {
        color::configure_color(ColorMode::Off);

        assert_eq!(Error("no keys").to_string(), "error: no keys");
        assert_eq!(Warning("slow model").to_string(), "warning: slow model");
    }
}
