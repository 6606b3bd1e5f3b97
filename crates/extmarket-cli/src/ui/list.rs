//! Column-aligned rendering for `extm list` and `extm search`.

use super::buffer::OutputBuffer;
use super::theme::Theme;
use crossterm::style::Stylize;
use extmarket_schema::{CatalogEntry, InstallStatus, InstalledRecord};
use std::io::Write;

/// One line of a package listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// `parent/child` for bundled children, the bare name for roots
    pub name: String,
    pub version: String,
    /// Newer version when the record is stale
    pub latest: String,
    pub status: Option<InstallStatus>,
    pub installed: bool,
    pub title: String,
}

impl Row {
    pub fn from_catalog(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            latest: entry.latest_version.clone(),
            status: entry.status,
            installed: entry.status.is_some() || entry.path.is_some(),
            title: title(&entry.cname, &entry.description),
        }
    }

    pub fn from_record(parent: &str, record: &InstalledRecord) -> Self {
        let name = if parent == record.name {
            record.name.clone()
        } else {
            format!("{parent}/{}", record.name)
        };
        let mut title = title(&record.cname, &record.description);
        if !record.enable {
            title = format!("(disabled) {title}");
        }
        Self {
            name,
            version: if record.aversion.is_empty() {
                record.version.clone()
            } else {
                record.aversion.clone()
            },
            latest: record.latest_version.clone(),
            status: record.status,
            installed: true,
            title,
        }
    }
}

fn title(cname: &str, description: &str) -> String {
    if cname.is_empty() {
        description.to_string()
    } else {
        cname.to_string()
    }
}

/// Print column headers for `extm list`
pub fn print_list_header<W: Write>(buffer: &mut OutputBuffer<W>) {
    let theme = Theme::default();

    let header = format!(
        "  {:<sw$} {:<nw$} {:<vw$} {}",
        "status",
        "name",
        "version",
        "title",
        sw = theme.layout.status_width + 2,
        nw = theme.layout.name_width,
        vw = theme.layout.version_width,
    );
    buffer.write_line(&header.dark_grey().to_string(), theme.colors.header);
}

/// Print a single row for `extm list`
pub fn print_list_row<W: Write>(buffer: &mut OutputBuffer<W>, row: &Row) {
    let theme = Theme::default();
    let (icon, label, color) = theme.status(row.status, row.installed);

    let status_part = format!("{icon} {label:<width$}", width = theme.layout.status_width);
    let name_part = format!("{:<width$}", row.name, width = theme.layout.name_width);
    let version = if row.latest.is_empty() {
        row.version.clone()
    } else {
        format!("{} → {}", row.version, row.latest)
    };
    let version_part = format!("{version:<width$}", width = theme.layout.version_width);

    let line = format!(
        "  {} {} {} {}",
        status_part.with(color),
        name_part.with(theme.colors.package_name),
        version_part.with(theme.colors.version),
        row.title.as_str().with(theme.colors.secondary)
    );
    buffer.write_line(&line, theme.colors.secondary);
}

/// Print footer for `extm list`
pub fn print_list_footer<W: Write>(buffer: &mut OutputBuffer<W>, rows: &[Row]) {
    let theme = Theme::default();
    let outdated = rows
        .iter()
        .filter(|r| r.status == Some(InstallStatus::Outdate))
        .count();

    buffer.write_line("", theme.colors.header);
    let msg = format!("  {} packages, {outdated} outdated", rows.len());
    buffer.write_line(&msg.dark_grey().to_string(), theme.colors.secondary);
}

/// Print a single row for `extm search`
pub fn print_search_row<W: Write>(buffer: &mut OutputBuffer<W>, name: &str, version: &str, description: &str) {
    let theme = Theme::default();

    let name_part = format!("{:<width$}", name, width = theme.layout.name_width);
    let version_part = format!("{:<width$}", version, width = theme.layout.version_width);

    let line = format!(
        "  {} {} {}",
        name_part.with(theme.colors.package_name),
        version_part.with(theme.colors.version),
        description.with(theme.colors.secondary)
    );
    buffer.write_line(&line, theme.colors.secondary);
}
