//! List command

use anyhow::Result;
use extmarket_core::Reconciliation;

use crate::GlobalArgs;
use crate::ui::Output;
use crate::ui::buffer::OutputBuffer;
use crate::ui::list::{Row, print_list_footer, print_list_header, print_list_row};

/// Which of the three views to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    All,
    Installed,
    Available,
}

impl View {
    pub fn pick(installed: bool, available: bool) -> Self {
        match (installed, available) {
            (true, _) => Self::Installed,
            (_, true) => Self::Available,
            _ => Self::All,
        }
    }
}

/// Rows of one view, Project taxonomy first.
pub fn rows(view: View, views: &Reconciliation) -> Vec<Row> {
    match view {
        View::All => views.all.entries().map(|(_, _, _, e)| Row::from_catalog(e)).collect(),
        View::Available => views
            .uninstalled
            .entries()
            .map(|(_, _, _, e)| Row::from_catalog(e))
            .collect(),
        View::Installed => views
            .installed
            .entries()
            .map(|(_, parent, _, r)| Row::from_record(parent, r))
            .collect(),
    }
}

/// Show catalog and installed packages with their status
pub async fn list(global: &GlobalArgs, view: View, json: bool) -> Result<()> {
    let manager = super::open_manager(global)?;
    let reporter = Output::new(global.quiet);

    // A catalog failure still leaves the installed view to show
    let views = match manager.reconcile().await {
        Ok(views) => views,
        Err(failure) => {
            reporter.warning(&format!("Catalog unavailable: {}", failure.error));
            failure.fallback
        }
    };

    if json {
        let out = match view {
            View::All => serde_json::to_string_pretty(&views.all)?,
            View::Installed => serde_json::to_string_pretty(&views.installed)?,
            View::Available => serde_json::to_string_pretty(&views.uninstalled)?,
        };
        println!("{out}");
        return Ok(());
    }

    let rows = rows(view, &views);
    if rows.is_empty() {
        println!();
        match view {
            View::Installed => {
                println!("  No packages installed.");
                println!("  Run 'extm list --available' to see what can be installed.");
            }
            View::All | View::Available => println!("  No packages to show."),
        }
        return Ok(());
    }

    let mut buffer = OutputBuffer::default();
    println!();
    print_list_header(&mut buffer);
    for row in &rows {
        print_list_row(&mut buffer, row);
    }
    print_list_footer(&mut buffer, &rows);
    buffer.flush();

    Ok(())
}
