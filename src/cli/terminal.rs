//! Terminal capability detection and utilities

use std::io::{self, BufRead};

use owo_colors::{colors::css, OwoColorize};

/// Detects whether colored output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Asks for confirmation on stderr and reads the answer from stdin.
///
/// Anything but `y` counts as no.
pub fn prompt_to_proceed() -> io::Result<bool> {
    eprint!("\nProceed? (y/N) ");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as success (green)
    fn success(&self) -> String;
    /// Color as warning (amber)
    fn warning(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

impl Colorize for str {
    fn success(&self) -> String {
        if supports_color() {
            self.fg::<css::Green>().to_string()
        } else {
            self.to_string()
        }
    }

    fn warning(&self) -> String {
        if supports_color() {
            self.fg::<css::Orange>().to_string()
        } else {
            self.to_string()
        }
    }

    fn dim(&self) -> String {
        if supports_color() {
            self.dimmed().to_string()
        } else {
            self.to_string()
        }
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}
