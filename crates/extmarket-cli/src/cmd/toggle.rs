//! Enable and disable commands

use anyhow::{Result, bail};
use extmarket_schema::{InstallStatus, InstalledRecord, Taxonomy};

use crate::GlobalArgs;
use crate::ui::Output;

/// Flip the enable flag of one installed record
pub fn toggle(
    global: &GlobalArgs,
    name: &str,
    parent: Option<&str>,
    taxonomy: Taxonomy,
    enable: bool,
) -> Result<()> {
    let manager = super::open_manager(global)?;
    let reporter = Output::new(global.quiet);
    let parent = parent.unwrap_or(name);

    let state = manager.store().read()?;
    let Some(record) = state.get(taxonomy, parent, name) else {
        bail!("{name} is not installed under {taxonomy}/{parent}");
    };
    if record.status == Some(InstallStatus::Installing) {
        bail!("{name} is still installing");
    }

    let verb = if enable { "enabled" } else { "disabled" };
    if record.enable == enable {
        reporter.info(&format!("{name} is already {verb}"));
        return Ok(());
    }

    if global.dry_run {
        reporter.info(&format!("Would mark {name} {verb}"));
        return Ok(());
    }

    manager.set_status_or_enable(taxonomy, parent, name, kept_status(record), Some(enable))?;
    reporter.success(&format!("{name} {verb}"));
    Ok(())
}

/// Status to write back alongside a new enable flag: the record's own, so a
/// toggle never changes lifecycle state.
fn kept_status(record: &InstalledRecord) -> InstallStatus {
    record.status.unwrap_or(InstallStatus::Installed)
}
