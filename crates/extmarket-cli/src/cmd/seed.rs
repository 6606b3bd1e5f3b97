//! Seed command

use std::path::PathBuf;

use anyhow::{Context, Result};
use extmarket_schema::{Manifest, PackageType, Taxonomy};

use crate::GlobalArgs;
use crate::ui::Output;

/// Read project manifests from disk, keeping only project bundles.
pub fn read_projects(paths: &[PathBuf], reporter: &Output) -> Result<Vec<Manifest>> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if extmarket_schema::record::package_type(&manifest) == PackageType::ProjectBundle {
            out.push(manifest);
        } else {
            reporter.warning(&format!("{} is not a project bundle, skipped", manifest.name));
        }
    }
    Ok(out)
}

/// Record bundled projects as installed
pub fn seed(global: &GlobalArgs, paths: &[PathBuf]) -> Result<()> {
    let reporter = Output::new(global.quiet);
    let manifests = read_projects(paths, &reporter)?;
    if manifests.is_empty() {
        reporter.info("Nothing to seed.");
        return Ok(());
    }

    if global.dry_run {
        for m in &manifests {
            reporter.info(&format!("Would record {}@{}", m.name, m.version));
        }
        return Ok(());
    }

    let manager = super::open_manager(global)?;
    let tree = manager.seed_builtin_projects(&manifests)?;
    reporter.success(&format!(
        "Seeded {} project(s); {} installed in total",
        manifests.len(),
        tree.taxonomy(Taxonomy::Project).len()
    ));
    Ok(())
}
