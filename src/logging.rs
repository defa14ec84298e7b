//! Console logging set-up.

use anstyle::{AnsiColor, Color, Style};
use colog::format::CologStyle;
use colog::{default_builder, formatter};
use log::{Level, LevelFilter, SetLoggerError};

/// Create a style with a defined foreground color.
const fn style_from_fg(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

/// Logging tokens for `colog`.
#[derive(Debug, Clone, Copy)]
pub struct LogTokens;

impl CologStyle for LogTokens {
    fn level_token(&self, level: &Level) -> &str {
        match *level {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }

    fn prefix_token(&self, level: &Level) -> String {
        format!("{}:", self.level_color(level, self.level_token(level)))
    }

    fn level_color(&self, level: &Level, msg: &str) -> String {
        let style = match level {
            Level::Error => style_from_fg(AnsiColor::Red),
            Level::Warn => style_from_fg(AnsiColor::Yellow),
            Level::Info => style_from_fg(AnsiColor::Green),
            Level::Debug => style_from_fg(AnsiColor::Blue),
            Level::Trace => style_from_fg(AnsiColor::Magenta),
        };

        format!("{}{}{:#}", style, msg, style)
    }
}

/// Map the number of `-v` flags to a level filter.
///
/// Only two levels of verbosity are supported; anything above is `None`.
pub fn level_for(verbosity: usize) -> Option<LevelFilter> {
    match verbosity {
        0 => Some(LevelFilter::Info),
        1 => Some(LevelFilter::Debug),
        2 => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Install the global logger.
pub fn setup(level: LevelFilter) -> Result<(), SetLoggerError> {
    let mut log_build = default_builder();
    log_build.format(formatter(LogTokens));
    log_build.filter(None, level);

    log_build.try_init()
}
