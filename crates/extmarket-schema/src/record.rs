//! Normalized package records.
//!
//! [`CatalogEntry`] is the per-cycle view of a remote package and
//! [`InstalledRecord`] is one persisted row of local state. Both are built
//! from a [`Manifest`] through the same field extraction; there is no other
//! way to turn raw registry data into either record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::manifest::{Manifest, RegistryDocument};
use crate::types::{InstallStatus, PackageType, SubPlugin};

/// Errors raised while normalizing registry documents.
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    /// The document has no `latest` tag, or the tag points at an unpublished version.
    #[error("package '{0}' has no resolvable 'latest' dist-tag")]
    MissingLatest(String),
}

/// Classify a manifest by its market marker.
pub fn package_type(manifest: &Manifest) -> PackageType {
    match &manifest.market {
        Some(meta) if meta.is_project => PackageType::ProjectBundle,
        Some(_) => PackageType::StandalonePlugin,
        None => PackageType::OrdinaryModule,
    }
}

/// Fields every normalized record shares.
struct Common {
    package_type: PackageType,
    cname: String,
    icon_for_search: String,
    link: String,
    author: String,
    ide_deps: Vec<SubPlugin>,
    disable_uninstall: bool,
}

impl Common {
    fn extract(manifest: &Manifest) -> Self {
        let package_type = package_type(manifest);
        let author = manifest
            .author
            .as_ref()
            .map(crate::types::Author::display)
            .unwrap_or_default();

        // Only market packages carry display fields; modules pass through bare.
        match manifest.market.as_ref().filter(|_| package_type.is_installable()) {
            Some(meta) => Self {
                package_type,
                cname: meta
                    .cname
                    .clone()
                    .or_else(|| meta.description.cname.clone())
                    .or_else(|| meta.description.name.clone())
                    .unwrap_or_default(),
                icon_for_search: meta.description.icon_for_search.clone().unwrap_or_default(),
                link: meta.description.link.clone().unwrap_or_default(),
                author,
                ide_deps: meta.plugins.clone(),
                disable_uninstall: meta.disable_uninstall,
            },
            None => Self {
                package_type,
                cname: String::new(),
                icon_for_search: String::new(),
                link: String::new(),
                author,
                ide_deps: Vec::new(),
                disable_uninstall: false,
            },
        }
    }
}

/// Normalized view of one remote package's latest manifest, annotated with
/// staleness when a matching installed record exists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEntry {
    /// Package name.
    pub name: String,
    /// Classification derived from the market marker.
    #[serde(rename = "type")]
    pub package_type: PackageType,
    /// Display name; empty for ordinary modules.
    pub cname: String,
    /// Icon shown in search results.
    pub icon_for_search: String,
    /// Homepage or documentation link.
    pub link: String,
    /// Flattened author (name or email).
    pub author: String,
    /// One-line summary.
    pub description: String,
    /// Long-form readme text.
    pub readme: String,
    /// Version of the latest manifest.
    pub version: String,
    /// Declared sub-plugins.
    pub ide_deps: Vec<SubPlugin>,
    /// Runtime dependencies (name to version range).
    pub dependencies: BTreeMap<String, String>,
    /// The host should not offer an uninstall action.
    pub disable_uninstall: bool,
    /// Every published version, registry order.
    pub versions_list: Vec<String>,
    /// Distribution tags (`latest`, `beta`, ...).
    #[serde(rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,

    /// Set to `update` by reconciliation when a newer version exists.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::types::lenient_status"
    )]
    pub status: Option<InstallStatus>,
    /// Installed version when an update is available.
    pub latest_version: String,
    /// On-disk manifest of the matching installed record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CatalogEntry {
    /// Normalize a raw registry document by picking the manifest its
    /// `latest` tag points at.
    pub fn from_registry(doc: &RegistryDocument) -> Result<Self, NormalizeError> {
        let manifest = doc
            .latest()
            .ok_or_else(|| NormalizeError::MissingLatest(doc.name.clone()))?;
        let common = Common::extract(manifest);

        Ok(Self {
            name: manifest.name.clone(),
            package_type: common.package_type,
            cname: common.cname,
            icon_for_search: common.icon_for_search,
            link: common.link,
            author: common.author,
            description: manifest.description.clone().unwrap_or_default(),
            readme: manifest.readme.clone().unwrap_or_default(),
            version: manifest.version.clone(),
            ide_deps: common.ide_deps,
            dependencies: manifest.dependencies.clone(),
            disable_uninstall: common.disable_uninstall,
            versions_list: doc.version_list(),
            dist_tags: doc.dist_tags.clone(),
            status: manifest.status,
            latest_version: manifest.latest_version.clone().unwrap_or_default(),
            path: manifest.path.clone(),
        })
    }
}

/// One persisted row of local install state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstalledRecord {
    /// Package name.
    pub name: String,
    /// Classification derived from the market marker.
    #[serde(rename = "type")]
    pub package_type: PackageType,
    /// Display name; empty for ordinary modules.
    pub cname: String,
    /// Icon shown in search results.
    pub icon_for_search: String,
    /// Homepage or documentation link.
    pub link: String,
    /// Flattened author (name or email).
    pub author: String,
    /// One-line summary.
    pub description: String,
    /// Long-form readme text.
    pub readme: String,
    /// Declared version specification (exact, tag or range).
    pub version: String,
    /// Version actually on disk.
    pub aversion: String,
    /// Best known newer version; empty when current.
    pub latest_version: String,
    /// Install lifecycle status.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::types::lenient_status"
    )]
    pub status: Option<InstallStatus>,
    /// Whether the host should load the package.
    pub enable: bool,
    /// On-disk location of the installed manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Declared sub-plugins.
    pub ide_deps: Vec<SubPlugin>,
    /// Runtime dependencies (name to version range).
    pub dependencies: BTreeMap<String, String>,
    /// The host should not offer an uninstall action.
    pub disable_uninstall: bool,
}

impl InstalledRecord {
    /// Normalize an installed (or about-to-be-recorded) manifest. Local
    /// bookkeeping fields on the manifest carry straight through.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let common = Common::extract(manifest);

        Self {
            name: manifest.name.clone(),
            package_type: common.package_type,
            cname: common.cname,
            icon_for_search: common.icon_for_search,
            link: common.link,
            author: common.author,
            description: manifest.description.clone().unwrap_or_default(),
            readme: manifest.readme.clone().unwrap_or_default(),
            version: manifest.version.clone(),
            aversion: manifest.aversion.clone().unwrap_or_default(),
            latest_version: manifest.latest_version.clone().unwrap_or_default(),
            status: manifest.status,
            enable: true,
            path: manifest.path.clone(),
            ide_deps: common.ide_deps,
            dependencies: manifest.dependencies.clone(),
            disable_uninstall: common.disable_uninstall,
        }
    }
}

/// Normalize several registry documents into a mapping keyed by package
/// name; a later document with the same name replaces an earlier one.
pub fn normalize_catalog(
    docs: &[RegistryDocument],
) -> Result<BTreeMap<String, CatalogEntry>, NormalizeError> {
    let mut out = BTreeMap::new();
    for doc in docs {
        let entry = CatalogEntry::from_registry(doc)?;
        out.insert(entry.name.clone(), entry);
    }
    Ok(out)
}

/// Normalize installed manifests into records keyed by package name.
pub fn normalize_installed<'a>(
    manifests: impl IntoIterator<Item = &'a Manifest>,
) -> BTreeMap<String, InstalledRecord> {
    manifests
        .into_iter()
        .map(|m| (m.name.clone(), InstalledRecord::from_manifest(m)))
        .collect()
}

/// Targeted update of one record's status and, optionally, its enable flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordPatch {
    /// New status.
    pub status: InstallStatus,
    /// New enable flag; left untouched when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
}
