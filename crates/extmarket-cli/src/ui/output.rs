//! Status messages for commands.

use super::theme::Theme;
use crossterm::style::Stylize;

/// Prints one-line status messages; `quiet` silences everything but errors.
#[derive(Debug, Clone, Default)]
pub struct Output {
    theme: Theme,
    quiet: bool,
}

impl Output {
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: Theme::default(),
            quiet,
        }
    }

    /// Prints an informational message to the console.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", self.theme.icons.info.with(self.theme.colors.package_name));
        }
    }

    /// Prints a success message to the console.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", self.theme.icons.success.with(self.theme.colors.success));
        }
    }

    /// Prints a warning message to the console.
    pub fn warning(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {} {msg}", self.theme.icons.warning.with(self.theme.colors.warning));
        }
    }

    /// Prints an error message to the console.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", self.theme.icons.error.with(self.theme.colors.error));
    }
}
