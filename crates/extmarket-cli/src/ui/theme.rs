//! UI Theme - colors, icons and column widths shared by every command.

use crossterm::style::Color;
use extmarket_schema::InstallStatus;

/// Default theme for extm output
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
    pub layout: Layout,
}

/// Color scheme for UI elements
#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Package names (primary content)
    pub package_name: Color,
    /// Version numbers
    pub version: Color,
    /// Descriptions and secondary info
    pub secondary: Color,
    /// Headers and labels
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    /// In-flight installs
    pub active: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            package_name: Color::Cyan,
            version: Color::White,
            secondary: Color::DarkGrey,
            header: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            active: Color::Blue,
        }
    }
}

/// Status icons for different states
#[derive(Debug, Clone)]
pub struct Icons {
    /// Not installed (○)
    pub pending: &'static str,
    /// Installing (●)
    pub active: &'static str,
    /// Installed (✓)
    pub success: &'static str,
    /// Failed (✗)
    pub error: &'static str,
    /// Outdated (⚠)
    pub warning: &'static str,
    /// Info/Tip (ℹ)
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            pending: "○",
            active: "●",
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

/// Column widths
#[derive(Debug, Clone)]
pub struct Layout {
    pub name_width: usize,
    pub version_width: usize,
    pub status_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            name_width: 24,
            version_width: 12,
            status_width: 10,
        }
    }
}

impl Theme {
    /// Icon, label and color for a record's status. A record without a
    /// status is installed when it came from the state file, available
    /// otherwise.
    pub fn status(&self, status: Option<InstallStatus>, installed: bool) -> (&'static str, &'static str, Color) {
        match status {
            Some(InstallStatus::Outdate) => (self.icons.warning, "outdate", self.colors.warning),
            Some(InstallStatus::Installing) => (self.icons.active, "installing", self.colors.active),
            Some(InstallStatus::Installed) => (self.icons.success, "installed", self.colors.success),
            None if installed => (self.icons.success, "installed", self.colors.success),
            None => (self.icons.pending, "available", self.colors.secondary),
        }
    }
}
