//! Catalog vs. installed-state reconciliation.
//!
//! Pure functions over [`CatalogTree`] and [`StateTree`]; no I/O.

use std::path::Path;

use extmarket_schema::version::{is_newer, satisfies};
use extmarket_schema::{
    Bucket, CatalogEntry, CatalogTree, InstallStatus, InstalledRecord, Manifest, PackageType,
    StateTree, Taxonomy, record,
};
use serde::Serialize;

/// The three canonical views.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Full catalog, annotated with staleness where installed.
    pub all: CatalogTree,
    /// Catalog minus everything already installed.
    pub uninstalled: CatalogTree,
    /// Installed state, annotated with staleness.
    pub installed: StateTree,
}

/// The newer acceptable version for `record`, if any.
///
/// Roots and project bundles follow the `latest` tag. Everything else
/// follows its declared version: first as a tag, then as a range scanned in
/// registry order where the first satisfying, newer version wins.
pub fn newer_version(record: &InstalledRecord, is_root: bool, entry: &CatalogEntry) -> Option<String> {
    let current = record.aversion.as_str();

    if is_root || record.package_type == PackageType::ProjectBundle {
        return entry
            .dist_tags
            .get("latest")
            .filter(|latest| is_newer(current, latest))
            .cloned();
    }

    if let Some(tagged) = entry
        .dist_tags
        .get(&record.version)
        .filter(|tagged| is_newer(current, tagged))
    {
        return Some(tagged.clone());
    }

    // First match, not highest: registry order decides.
    entry
        .versions_list
        .iter()
        .find(|v| satisfies(v, &record.version) && is_newer(current, v))
        .cloned()
}

/// Catalog entry describing a record at `(taxonomy, parent, child)`: the
/// exact position, else the child's own root entry in either taxonomy.
fn locate<'a>(
    catalog: &'a CatalogTree,
    taxonomy: Taxonomy,
    parent: &str,
    child: &str,
) -> Option<&'a CatalogEntry> {
    catalog
        .get(taxonomy, parent, child)
        .or_else(|| catalog.root(Taxonomy::Project, child))
        .or_else(|| catalog.root(Taxonomy::Plugin, child))
}

/// Three-way reconciliation of the catalog against the installed view.
pub fn reconcile(catalog: &CatalogTree, installed: &StateTree) -> Reconciliation {
    let mut all = catalog.clone();
    let mut uninstalled = catalog.clone();
    let mut annotated = installed.clone();

    for (taxonomy, parent, child, record) in installed.entries() {
        let is_root = parent == child;

        if is_root {
            uninstalled.remove_root(taxonomy, parent);
        } else {
            uninstalled.remove_child(taxonomy, parent, child);
        }

        let Some(entry) = locate(catalog, taxonomy, parent, child) else {
            tracing::debug!("No catalog entry for installed {taxonomy}/{parent}/{child}");
            continue;
        };
        let newer = newer_version(record, is_root, entry);

        if let Some(exact) = all.get_mut(taxonomy, parent, child) {
            exact.path = Some(record.path.clone().unwrap_or_default());
            if let Some(v) = &newer {
                exact.status = Some(InstallStatus::Outdate);
                exact.latest_version.clone_from(v);
            }
        }

        if let (Some(v), Some(rec)) = (newer, annotated.get_mut(taxonomy, parent, child)) {
            rec.status = Some(InstallStatus::Outdate);
            rec.latest_version = v;
        }
    }

    Reconciliation {
        all,
        uninstalled,
        installed: annotated,
    }
}

/// Installed state without in-flight installs. A root marked `installing`
/// hides its whole bucket; a child marked `installing` hides only itself.
pub fn installed_view(mut state: StateTree) -> StateTree {
    for taxonomy in Taxonomy::ALL {
        let buckets = state.taxonomy_mut(taxonomy);
        buckets.retain(|parent, bucket| {
            bucket
                .get(parent)
                .is_none_or(|root| root.status != Some(InstallStatus::Installing))
        });
        for bucket in buckets.values_mut() {
            bucket.retain(|_, rec| rec.status != Some(InstallStatus::Installing));
        }
    }
    state
}

/// Root name owning `path`: a record whose manifest path is `path`, or sits
/// directly inside it. `Project` is searched before `Plugin`.
pub fn parent_of(state: &StateTree, path: &Path) -> Option<String> {
    state
        .entries()
        .find(|(_, _, _, rec)| {
            rec.path.as_deref().is_some_and(|p| {
                let p = Path::new(p);
                p == path || p.parent() == Some(path)
            })
        })
        .map(|(_, parent, _, _)| parent.to_string())
}

/// One unit of an install plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    /// Taxonomy of the root.
    pub taxonomy: Taxonomy,
    /// Root the unit belongs to.
    pub parent: String,
    /// Package to install; equals `parent` for the root itself.
    pub child: String,
    /// Version request handed to the install tool.
    pub version: String,
}

/// Flatten a manifest into the units an install must fetch: the package
/// itself, then its declared sub-plugins under it. A sub-plugin declared
/// twice keeps its last version.
pub fn install_plan(manifest: &Manifest) -> Vec<PlanItem> {
    let Some(taxonomy) = Taxonomy::for_type(record::package_type(manifest)) else {
        return Vec::new();
    };

    let root = (manifest.name.clone(), manifest.version.clone());
    let subs = manifest
        .market
        .iter()
        .flat_map(|m| m.plugins.iter())
        .map(|p| (p.name.clone(), p.version.clone()));

    let mut plan: Vec<PlanItem> = Vec::new();
    for (child, version) in std::iter::once(root).chain(subs) {
        if let Some(existing) = plan.iter_mut().find(|i| i.child == child) {
            existing.version = version;
            continue;
        }
        plan.push(PlanItem {
            taxonomy,
            parent: manifest.name.clone(),
            child,
            version,
        });
    }
    plan
}

/// One bucket of the installed view, if that root is installed.
pub fn installed_bucket(
    state: StateTree,
    name: &str,
    taxonomy: Taxonomy,
) -> Option<Bucket<InstalledRecord>> {
    installed_view(state).remove_root(taxonomy, name)
}
