//! Reset command

use anyhow::Result;
use crossterm::style::Stylize;

use crate::GlobalArgs;
use crate::ui::Output;

/// Delete every installed package and empty the state
pub async fn reset(global: &GlobalArgs, yes: bool) -> Result<()> {
    let manager = super::open_manager(global)?;
    let reporter = Output::new(global.quiet);
    let root = manager.namespace().root();

    if global.dry_run {
        reporter.info(&format!("Would delete everything installed under {}", root.display()));
        return Ok(());
    }

    if !yes {
        use std::io::Write;
        println!();
        print!(
            "  {} This will remove every package under {}. Continue? (y/N) ",
            "WARNING:".bold().red(),
            root.display()
        );
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            reporter.error("Operation cancelled");
            return Ok(());
        }
    }

    manager.reset().await?;
    reporter.success("All packages removed");
    Ok(())
}
