//! Diagnostic logging to stderr.
//!
//! The filter is read from `CAREERRAMP_LOG` using the usual `tracing` directive
//! syntax (`careerramp=debug`, `info`, ...). Without it, the level follows the
//! number of `-v` flags.

use tracing_subscriber::EnvFilter;

use crate::cli::ColorMode;

const LOG_ENV: &str = "CAREERRAMP_LOG";

fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn default_directive(verbosity: u8) -> String {
    format!("careerramp={}", level_for_verbosity(verbosity))
}

pub(crate) fn init(verbosity: u8, color: ColorMode) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(color, ColorMode::On))
        .with_target(false)
        .without_time()
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(default_directive(0), "careerramp=warn");
        assert_eq!(default_directive(1), "careerramp=info");
        assert_eq!(default_directive(2), "careerramp=debug");
        assert_eq!(default_directive(7), "careerramp=trace");
    }
}
