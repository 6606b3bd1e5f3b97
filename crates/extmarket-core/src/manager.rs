//! The package manager: catalog fetch, reconciliation and install flows.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use extmarket_schema::record::normalize_catalog;
use extmarket_schema::{
    Bucket, CatalogTree, InstallStatus, InstalledRecord, Manifest, NormalizeError, PackageSummary,
    PackageType, RecordPatch, StateTree, Taxonomy, Tree,
};
use futures::future::try_join_all;
use tokio::sync::RwLock;

use crate::catalog::{AllowListSource, CatalogClient, HttpAllowList, ProbeClassifier, RegistryClient};
use crate::config::MarketConfig;
use crate::coordinator::{DownloadCoordinator, is_valid_package_name};
use crate::error::{MarketError, ReconcileFailure};
use crate::installer::{InstalledUnit, PackageInstaller};
use crate::paths::{self, Namespace};
use crate::process::TokioProcessRunner;
use crate::reconcile::{self, PlanItem, Reconciliation};
use crate::state::StateStore;
use crate::toolchain::ArchiveProvisioner;

/// External collaborators the manager drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Registry search and document fetches.
    pub catalog: Arc<dyn CatalogClient>,
    /// Source of allowed package names.
    pub allow_list: Arc<dyn AllowListSource>,
    /// Serial install queue.
    pub coordinator: DownloadCoordinator,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// Entry point for every market operation on one namespace.
pub struct PackageManager {
    config: MarketConfig,
    namespace: Namespace,
    store: Arc<StateStore>,
    catalog: Arc<dyn CatalogClient>,
    allow_list: Arc<dyn AllowListSource>,
    coordinator: DownloadCoordinator,
    cached: RwLock<Option<CatalogTree>>,
}

impl std::fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("namespace", &self.namespace)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl PackageManager {
    /// Manager over `namespace` driving the given collaborators.
    pub fn new(config: MarketConfig, namespace: Namespace, parts: Collaborators) -> Self {
        let store = Arc::new(StateStore::for_namespace(&namespace));
        Self {
            config,
            namespace,
            store,
            catalog: parts.catalog,
            allow_list: parts.allow_list,
            coordinator: parts.coordinator,
            cached: RwLock::new(None),
        }
    }

    /// Wire the HTTP, process and toolchain implementations from `config`.
    /// Must be called inside a tokio runtime (the install queue is spawned).
    pub fn from_config(config: MarketConfig) -> Result<Self, MarketError> {
        let base = config.base_dir().ok_or_else(|| {
            MarketError::context(
                "resolving market home",
                format!("no home directory; set {}", paths::HOME_ENV),
            )
        })?;
        let namespace = Namespace::new(base, config.namespace.clone());

        let client = reqwest::Client::builder()
            .user_agent(crate::catalog::USER_AGENT)
            .build()
            .map_err(|e| MarketError::context("building HTTP client", e))?;

        let classifier = Arc::new(ProbeClassifier::new(
            client.clone(),
            config.probe_url.clone(),
            Duration::from_millis(config.probe_timeout_ms),
        ));
        let provisioner = Arc::new(ArchiveProvisioner::new(
            client.clone(),
            namespace.toolchain_dir(),
            config.toolchain.clone(),
        ));
        let installer = Arc::new(PackageInstaller::new(
            Arc::new(TokioProcessRunner),
            provisioner,
            classifier.clone(),
            config.registries.clone(),
        ));

        let parts = Collaborators {
            catalog: Arc::new(RegistryClient::new(
                client.clone(),
                config.registries.clone(),
                classifier,
            )),
            allow_list: Arc::new(HttpAllowList::new(client)),
            coordinator: DownloadCoordinator::spawn(namespace.clone(), installer),
        };
        Ok(Self::new(config, namespace, parts))
    }

    /// Namespace the manager operates on.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The install state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Names on the allow-list, or `None` when filtering does not apply.
    /// A failing allow-list source degrades to no filtering.
    async fn allowed_names(&self) -> Option<BTreeSet<String>> {
        if self.config.ignore_whitelist {
            return None;
        }
        match self.allow_list.fetch(&self.config.whitelist_url).await {
            Ok(list) if !list.is_empty() => Some(list.into_iter().map(|e| e.name).collect()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Allow-list unavailable, not filtering: {e}");
                None
            }
        }
    }

    async fn filtered_list(&self) -> Result<Vec<PackageSummary>, MarketError> {
        let list = self.catalog.fetch_list(&self.config.keyword).await?;
        Ok(match self.allowed_names().await {
            Some(allowed) => list.into_iter().filter(|p| allowed.contains(&p.name)).collect(),
            None => list,
        })
    }

    /// Keyword search without detail fetches.
    pub async fn search_names(&self) -> Result<Vec<PackageSummary>, MarketError> {
        self.filtered_list().await
    }

    async fn download_catalog(&self) -> Result<CatalogTree, MarketError> {
        let list = self.filtered_list().await?;
        tracing::debug!("Fetching {} package documents", list.len());

        let docs = try_join_all(list.iter().map(|p| self.catalog.fetch_detail(&p.name))).await?;
        let entries = normalize_catalog(&docs)?;
        let tree = CatalogTree::from_entries(entries.into_values());

        *self.cached.write().await = Some(tree.clone());
        Ok(tree)
    }

    /// The filtered, normalized catalog. Served from the cache once a fetch
    /// has succeeded.
    pub async fn fetch_catalog(&self) -> Result<CatalogTree, MarketError> {
        if let Some(tree) = self.cached.read().await.as_ref() {
            return Ok(tree.clone());
        }
        self.download_catalog().await
    }

    /// Fetch the catalog again, replacing the cache.
    pub async fn refresh_catalog(&self) -> Result<CatalogTree, MarketError> {
        self.download_catalog().await
    }

    /// Installed state with in-flight installs filtered out.
    pub fn installed(&self) -> Result<StateTree, MarketError> {
        Ok(reconcile::installed_view(self.store.read()?))
    }

    /// One root's bucket of the installed view.
    pub fn installed_bucket(
        &self,
        name: &str,
        taxonomy: Taxonomy,
    ) -> Result<Option<Bucket<InstalledRecord>>, MarketError> {
        Ok(reconcile::installed_bucket(self.store.read()?, name, taxonomy))
    }

    /// Three-way reconciliation. On failure the installed view is still
    /// returned, re-read from the store.
    pub async fn reconcile(&self) -> Result<Reconciliation, ReconcileFailure> {
        let attempt = async {
            let catalog = self.fetch_catalog().await?;
            let installed = self.installed()?;
            Ok::<_, MarketError>(reconcile::reconcile(&catalog, &installed))
        };

        attempt.await.map_err(|error| {
            let installed = self.installed().unwrap_or_default();
            ReconcileFailure {
                error,
                fallback: Reconciliation {
                    installed,
                    ..Reconciliation::default()
                },
            }
        })
    }

    async fn resolve_manifest(&self, name: &str, request: &str) -> Result<Manifest, MarketError> {
        let doc = self.catalog.fetch_detail(name).await?;
        doc.resolve(request)
            .cloned()
            .ok_or_else(|| NormalizeError::MissingLatest(name.to_string()).into())
    }

    /// The units installing `name@request` would fetch.
    pub async fn install_plan(&self, name: &str, request: &str) -> Result<Vec<PlanItem>, MarketError> {
        let manifest = self.resolve_manifest(name, request).await?;
        Ok(reconcile::install_plan(&manifest))
    }

    /// Install a project bundle and its plugins under `Project/<name>`.
    pub async fn install_project(&self, name: &str, request: &str) -> Result<StateTree, MarketError> {
        self.install(name, request, PackageType::ProjectBundle).await
    }

    /// Install a standalone plugin and its sub-plugins under `Plugin/<name>`.
    /// Records land with status `installing` until the host confirms them.
    pub async fn install_plugin(&self, name: &str, request: &str) -> Result<StateTree, MarketError> {
        self.install(name, request, PackageType::StandalonePlugin).await
    }

    async fn install(
        &self,
        name: &str,
        request: &str,
        expected: PackageType,
    ) -> Result<StateTree, MarketError> {
        if !is_valid_package_name(name) {
            return Err(MarketError::Validation(format!("invalid package name '{name}'")));
        }
        let request = if request.is_empty() { "latest" } else { request };

        let manifest = self.resolve_manifest(name, request).await?;
        let actual = extmarket_schema::record::package_type(&manifest);
        let taxonomy = Taxonomy::for_type(actual)
            .filter(|_| actual == expected)
            .ok_or_else(|| {
                MarketError::Validation(format!("{name} is a {actual:?}, not a {expected:?}"))
            })?;

        let plan = reconcile::install_plan(&manifest);
        if let Some(bad) = plan.iter().find(|i| !is_valid_package_name(&i.child)) {
            return Err(MarketError::Validation(format!(
                "{name} declares invalid sub-plugin name '{}'",
                bad.child
            )));
        }

        let mut pending = Vec::with_capacity(plan.len());
        for item in &plan {
            let dir = Namespace::unit_subdir(item.taxonomy, &item.parent, &item.child, &item.version);
            if let Some(p) = self.coordinator.enqueue(&dir, &item.child, &item.version)? {
                pending.push(p.wait());
            }
        }
        let units = try_join_all(pending).await?;

        let status = (expected == PackageType::StandalonePlugin).then_some(InstallStatus::Installing);
        let mut partial = StateTree::new();
        for unit in &units {
            let record = installed_record(unit, status).await?;
            partial.insert(taxonomy, &manifest.name, &unit.name, record);
        }

        let tree = self.store.update(&partial, false)?;
        tracing::info!("Installed {} unit(s) for {name}@{}", units.len(), manifest.version);
        Ok(tree)
    }

    /// Set the status (and optionally the enable flag) of one existing
    /// record. A missing record leaves the state untouched.
    pub fn set_status_or_enable(
        &self,
        taxonomy: Taxonomy,
        parent: &str,
        name: &str,
        status: InstallStatus,
        enable: Option<bool>,
    ) -> Result<StateTree, MarketError> {
        let current = self.store.read()?;
        let mut patch: Tree<RecordPatch> = Tree::new();
        if current.get(taxonomy, parent, name).is_some() {
            patch.insert(taxonomy, parent, name, RecordPatch { status, enable });
        } else {
            tracing::debug!("No record {taxonomy}/{parent}/{name}; status left unchanged");
        }
        Ok(self.store.update(&patch, false)?)
    }

    /// Remove an installed root: its directory first, then its state. Only
    /// roots can be uninstalled.
    pub async fn uninstall(&self, name: &str, taxonomy: Taxonomy) -> Result<StateTree, MarketError> {
        let current = self.store.read()?;
        if current.bucket(taxonomy, name).is_none() {
            return Err(MarketError::Validation(format!(
                "{name} is not an installed {taxonomy} root"
            )));
        }

        let dir = self.namespace.taxonomy_dir(taxonomy).join(name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let tree = self.store.delete_root(name, taxonomy)?;
        tracing::info!("Uninstalled {taxonomy} {name}");
        Ok(tree)
    }

    /// Delete both taxonomy directories and empty the state.
    pub async fn reset(&self) -> Result<StateTree, MarketError> {
        for taxonomy in Taxonomy::ALL {
            let dir = self.namespace.taxonomy_dir(taxonomy);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        let tree = self.store.update(&StateTree::new(), true)?;
        tracing::info!("Reset {}", self.namespace.root().display());
        Ok(tree)
    }

    /// Record already-present project bundles as installed, skipping the
    /// download flow. Meant for the first materialization of built-ins.
    pub fn seed_builtin_projects(&self, manifests: &[Manifest]) -> Result<StateTree, MarketError> {
        let mut partial = StateTree::new();
        for (name, mut record) in extmarket_schema::record::normalize_installed(manifests) {
            record.status = Some(InstallStatus::Installed);
            record.aversion.clone_from(&record.version);
            partial.insert(Taxonomy::Project, &name, &name, record);
        }
        Ok(self.store.update(&partial, false)?)
    }

    /// Root owning an absolute path.
    pub fn parent_of(&self, path: &Path) -> Result<Option<String>, MarketError> {
        if !path.is_absolute() {
            return Err(MarketError::Validation(format!(
                "path should be absolute: {}",
                path.display()
            )));
        }
        Ok(reconcile::parent_of(&self.store.read()?, path))
    }
}

/// Read back the manifest the tool installed and turn it into a record:
/// `aversion` is what landed on disk, `version` is what was asked for.
async fn installed_record(
    unit: &InstalledUnit,
    status: Option<InstallStatus>,
) -> Result<InstalledRecord, MarketError> {
    let path = paths::installed_manifest_path(&unit.path, &unit.name);
    let bytes = tokio::fs::read(&path).await?;
    let mut manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| {
        MarketError::context("reading installed manifest", format!("{}: {e}", path.display()))
    })?;

    manifest.aversion = Some(manifest.version.clone());
    manifest.version.clone_from(&unit.version);
    manifest.path = Some(path.to_string_lossy().into_owned());
    manifest.status = status;

    Ok(InstalledRecord::from_manifest(&manifest))
}
