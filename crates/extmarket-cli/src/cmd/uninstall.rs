//! Uninstall command

use anyhow::{Result, bail};
use extmarket_schema::Taxonomy;

use crate::GlobalArgs;
use crate::ui::Output;

/// Remove an installed root and everything bundled under it
pub async fn uninstall(global: &GlobalArgs, name: &str, taxonomy: Taxonomy, force: bool) -> Result<()> {
    let manager = super::open_manager(global)?;
    let reporter = Output::new(global.quiet);

    let state = manager.store().read()?;
    let Some(root) = state.root(taxonomy, name) else {
        bail!("{name} is not an installed {taxonomy} package");
    };
    if root.disable_uninstall && !force {
        bail!("{name} is marked as not removable; pass --force to remove it anyway");
    }

    if global.dry_run {
        let dir = manager.namespace().taxonomy_dir(taxonomy).join(name);
        reporter.info(&format!("Would remove {}", dir.display()));
        return Ok(());
    }

    manager.uninstall(name, taxonomy).await?;
    reporter.success(&format!("{name} removed"));
    Ok(())
}
