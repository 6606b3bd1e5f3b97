//! Install command

use anyhow::{Context, Result};
use extmarket_core::PackageManager;
use extmarket_schema::{InstallStatus, PackageSpec, StateTree, Taxonomy};

use crate::GlobalArgs;
use crate::ui::Output;
use crate::ui::buffer::OutputBuffer;
use crate::ui::list::{Row, print_list_row};

/// Install a project bundle or standalone plugin
pub async fn install(global: &GlobalArgs, spec: &str, taxonomy: Taxonomy) -> Result<()> {
    let spec = PackageSpec::parse(spec)?;
    let manager = super::open_manager(global)?;
    let reporter = Output::new(global.quiet);

    if global.dry_run {
        let plan = manager.install_plan(&spec.name, spec.request()).await?;
        reporter.info(&format!("Would install {} unit(s):", plan.len()));
        for item in &plan {
            println!("    {}/{}/{}@{}", item.taxonomy, item.parent, item.child, item.version);
        }
        return Ok(());
    }

    reporter.info(&format!("Installing {}@{}...", spec.name, spec.request()));
    let tree = match taxonomy {
        Taxonomy::Project => manager.install_project(&spec.name, spec.request()).await,
        Taxonomy::Plugin => manager.install_plugin(&spec.name, spec.request()).await,
    }
    .with_context(|| format!("Failed to install {}", spec.name))?;

    let tree = match taxonomy {
        Taxonomy::Plugin => activate(&manager, &spec.name, &tree)?,
        Taxonomy::Project => tree,
    };

    if let Some(bucket) = tree.bucket(taxonomy, &spec.name) {
        let mut buffer = OutputBuffer::default();
        for record in bucket.values() {
            print_list_row(&mut buffer, &Row::from_record(&spec.name, record));
        }
        buffer.flush();
    }
    reporter.success(&format!("{} installed", spec.name));
    Ok(())
}

/// Plugin records land as `installing`; this front end has no host to load
/// them, so it confirms and enables them right away.
fn activate(manager: &PackageManager, name: &str, tree: &StateTree) -> Result<StateTree> {
    let children: Vec<String> = tree
        .bucket(Taxonomy::Plugin, name)
        .map(|b| b.keys().cloned().collect())
        .unwrap_or_default();

    let mut latest = tree.clone();
    for child in &children {
        latest = manager.set_status_or_enable(
            Taxonomy::Plugin,
            name,
            child,
            InstallStatus::Installed,
            Some(true),
        )?;
    }
    Ok(latest)
}
