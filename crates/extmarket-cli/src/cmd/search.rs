//! Search command

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use crate::GlobalArgs;
use crate::ui::buffer::OutputBuffer;

/// List catalog package names without fetching their documents
pub async fn search(global: &GlobalArgs) -> Result<()> {
    let start = std::time::Instant::now();
    let manager = super::open_manager(global)?;
    let results = manager
        .search_names()
        .await
        .context("Failed to search the catalog")?;

    let theme = crate::ui::Theme::default();
    if results.is_empty() {
        println!();
        println!("  {} No packages found", theme.icons.info.blue());
        println!();
        return Ok(());
    }

    let mut buffer = OutputBuffer::default();
    println!();
    for entry in &results {
        crate::ui::list::print_search_row(
            &mut buffer,
            &entry.name,
            entry.version.as_deref().unwrap_or("?"),
            entry.description.as_deref().unwrap_or(""),
        );
    }
    buffer.flush();

    if !global.quiet {
        println!();
        println!(
            "SEARCH COMPLETE {}, elapsed {:.2}s",
            results.len(),
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}
