//! Integration tests for the extension manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use extmarket_core::catalog::{AllowListSource, CatalogClient};
use extmarket_core::{
    CatalogError, Collaborators, DownloadCoordinator, InstallError, InstalledUnit, MarketConfig,
    MarketError, Namespace, PackageManager, UnitInstaller,
};
use extmarket_schema::{
    AllowListEntry, InstallStatus, InstalledRecord, Manifest, PackageSummary, PackageType,
    RegistryDocument, StateTree, Taxonomy,
};
use serde_json::json;

#[derive(Default)]
struct FakeCatalog {
    docs: HashMap<String, RegistryDocument>,
    offline: bool,
    list_calls: AtomicUsize,
}

impl FakeCatalog {
    fn with(mut self, doc: serde_json::Value) -> Self {
        let doc: RegistryDocument = serde_json::from_value(doc).unwrap();
        self.docs.insert(doc.name.clone(), doc);
        self
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_list(&self, _keyword: &str) -> Result<Vec<PackageSummary>, CatalogError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(CatalogError::BadUrl("offline".into()));
        }
        let mut names: Vec<_> = self.docs.keys().cloned().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| PackageSummary {
                name,
                ..Default::default()
            })
            .collect())
    }

    async fn fetch_detail(&self, name: &str) -> Result<RegistryDocument, CatalogError> {
        if self.offline {
            return Err(CatalogError::BadUrl("offline".into()));
        }
        self.docs
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::BadUrl(format!("no such package {name}")))
    }
}

enum FakeAllowList {
    Names(Vec<&'static str>),
    Unavailable,
}

#[async_trait]
impl AllowListSource for FakeAllowList {
    async fn fetch(&self, _url: &str) -> Result<Vec<AllowListEntry>, CatalogError> {
        match self {
            Self::Names(names) => Ok(names
                .iter()
                .map(|n| AllowListEntry {
                    name: (*n).to_string(),
                })
                .collect()),
            Self::Unavailable => Err(CatalogError::BadUrl("allow-list down".into())),
        }
    }
}

/// Simulates the install tool: drops `node_modules/<name>/package.json`
/// with the version it "resolved".
#[derive(Default)]
struct FakeInstaller {
    resolved: HashMap<String, String>,
    projects: Vec<&'static str>,
    fail: Option<String>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl UnitInstaller for FakeInstaller {
    async fn install(
        &self,
        work_dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<InstalledUnit, InstallError> {
        self.calls.lock().unwrap().push(format!("{name}@{version}"));
        if self.fail.as_deref() == Some(name) {
            return Err(InstallError::ToolFailed {
                name: name.to_string(),
                code: Some(1),
            });
        }
        let actual = self.resolved.get(name).cloned().unwrap_or_else(|| version.to_string());
        let dir = work_dir.join("node_modules").join(name);
        std::fs::create_dir_all(&dir)?;
        let is_project = self.projects.iter().any(|p| *p == name);
        let manifest = json!({"name": name, "version": actual, "cygnus": {"isProject": is_project}});
        std::fs::write(dir.join("package.json"), manifest.to_string())?;
        Ok(InstalledUnit {
            name: name.to_string(),
            version: version.to_string(),
            path: work_dir.to_path_buf(),
        })
    }
}

fn project_doc() -> serde_json::Value {
    json!({
        "name": "demo",
        "versions": {
            "1.0.0": {"name": "demo", "version": "1.0.0", "cygnus": {"isProject": true}},
            "1.1.0": {
                "name": "demo",
                "version": "1.1.0",
                "cygnus": {
                    "isProject": true,
                    "cname": "Demo Project",
                    "plugins": [{"name": "helper", "version": "^1.0.0"}]
                }
            }
        },
        "dist-tags": {"latest": "1.1.0"}
    })
}

fn plugin_doc() -> serde_json::Value {
    json!({
        "name": "helper",
        "versions": {
            "1.0.0": {"name": "helper", "version": "1.0.0", "cygnus": {}},
            "1.0.4": {"name": "helper", "version": "1.0.4", "cygnus": {}}
        },
        "dist-tags": {"latest": "1.0.4"}
    })
}

fn module_doc() -> serde_json::Value {
    json!({
        "name": "lodash",
        "versions": {"4.17.21": {"name": "lodash", "version": "4.17.21"}},
        "dist-tags": {"latest": "4.17.21"}
    })
}

struct Harness {
    _dir: tempfile::TempDir,
    namespace: Namespace,
    manager: PackageManager,
    catalog: Arc<FakeCatalog>,
    installer: Arc<FakeInstaller>,
}

fn harness_with(
    catalog: FakeCatalog,
    allow_list: FakeAllowList,
    installer: FakeInstaller,
    config: MarketConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let namespace = Namespace::new(dir.path(), "TEST");
    let catalog = Arc::new(catalog);
    let installer = Arc::new(installer);
    let parts = Collaborators {
        catalog: catalog.clone(),
        allow_list: Arc::new(allow_list),
        coordinator: DownloadCoordinator::spawn(namespace.clone(), installer.clone()),
    };
    let manager = PackageManager::new(config, namespace.clone(), parts);
    Harness {
        _dir: dir,
        namespace,
        manager,
        catalog,
        installer,
    }
}

fn harness() -> Harness {
    harness_with(
        FakeCatalog::default()
            .with(project_doc())
            .with(plugin_doc())
            .with(module_doc()),
        FakeAllowList::Names(Vec::new()),
        FakeInstaller {
            resolved: HashMap::from([("helper".to_string(), "1.0.0".to_string())]),
            projects: vec!["demo"],
            ..Default::default()
        },
        MarketConfig::default(),
    )
}

fn root_record(name: &str, ty: PackageType, aversion: &str) -> InstalledRecord {
    InstalledRecord {
        name: name.to_string(),
        package_type: ty,
        version: aversion.to_string(),
        aversion: aversion.to_string(),
        status: Some(InstallStatus::Installed),
        enable: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_outdated_project_stays_out_of_uninstalled() {
    let h = harness();
    let mut state = StateTree::new();
    state.insert(
        Taxonomy::Project,
        "demo",
        "demo",
        root_record("demo", PackageType::ProjectBundle, "1.0.0"),
    );
    h.manager.store().update(&state, false).unwrap();

    let views = h.manager.reconcile().await.unwrap();
    let demo = views.all.get(Taxonomy::Project, "demo", "demo").unwrap();
    assert_eq!(demo.status, Some(InstallStatus::Outdate));
    assert_eq!(demo.latest_version, "1.1.0");
    assert_eq!(demo.cname, "Demo Project");
    assert!(views.uninstalled.bucket(Taxonomy::Project, "demo").is_none());
    assert!(views.uninstalled.root(Taxonomy::Plugin, "helper").is_some());
    // Ordinary modules never reach the taxonomy views
    assert!(views.all.root(Taxonomy::Plugin, "lodash").is_none());

    let again = h.manager.reconcile().await.unwrap();
    assert_eq!(views, again);
}

#[tokio::test]
async fn test_catalog_is_cached_until_refresh() {
    let h = harness();
    h.manager.reconcile().await.unwrap();
    h.manager.reconcile().await.unwrap();
    assert_eq!(h.catalog.list_calls.load(Ordering::SeqCst), 1);

    h.manager.refresh_catalog().await.unwrap();
    assert_eq!(h.catalog.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fetch_catalog_reuses_cache() {
    let h = harness();
    let first = h.manager.fetch_catalog().await.unwrap();
    let second = h.manager.fetch_catalog().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.catalog.list_calls.load(Ordering::SeqCst), 1);

    h.manager.reconcile().await.unwrap();
    assert_eq!(h.catalog.list_calls.load(Ordering::SeqCst), 1);

    h.manager.refresh_catalog().await.unwrap();
    h.manager.fetch_catalog().await.unwrap();
    assert_eq!(h.catalog.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_allow_list_filters_catalog() {
    let h = harness_with(
        FakeCatalog::default().with(project_doc()).with(plugin_doc()),
        FakeAllowList::Names(vec!["helper"]),
        FakeInstaller::default(),
        MarketConfig::default(),
    );
    let names: Vec<_> = h
        .manager
        .search_names()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["helper"]);

    let tree = h.manager.fetch_catalog().await.unwrap();
    assert!(tree.root(Taxonomy::Project, "demo").is_none());
    assert!(tree.root(Taxonomy::Plugin, "helper").is_some());
}

#[tokio::test]
async fn test_allow_list_failure_and_override_disable_filtering() {
    let down = harness_with(
        FakeCatalog::default().with(project_doc()).with(plugin_doc()),
        FakeAllowList::Unavailable,
        FakeInstaller::default(),
        MarketConfig::default(),
    );
    assert_eq!(down.manager.search_names().await.unwrap().len(), 2);

    let ignored = harness_with(
        FakeCatalog::default().with(project_doc()).with(plugin_doc()),
        FakeAllowList::Names(vec!["helper"]),
        FakeInstaller::default(),
        MarketConfig {
            ignore_whitelist: true,
            ..MarketConfig::default()
        },
    );
    assert_eq!(ignored.manager.search_names().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_reconcile_failure_still_returns_installed_view() {
    let h = harness_with(
        FakeCatalog {
            offline: true,
            ..Default::default()
        },
        FakeAllowList::Names(Vec::new()),
        FakeInstaller::default(),
        MarketConfig::default(),
    );
    let mut state = StateTree::new();
    state.insert(
        Taxonomy::Plugin,
        "helper",
        "helper",
        root_record("helper", PackageType::StandalonePlugin, "1.0.0"),
    );
    h.manager.store().update(&state, false).unwrap();

    let failure = h.manager.reconcile().await.unwrap_err();
    assert!(matches!(failure.error, MarketError::Catalog(_)));
    assert!(failure.fallback.all.is_empty());
    assert!(failure.fallback.uninstalled.is_empty());
    assert!(failure.fallback.installed.root(Taxonomy::Plugin, "helper").is_some());
}

#[tokio::test]
async fn test_install_project_records_actual_versions() {
    let h = harness();
    let tree = h.manager.install_project("demo", "latest").await.unwrap();

    assert_eq!(
        *h.installer.calls.lock().unwrap(),
        vec!["demo@1.1.0".to_string(), "helper@^1.0.0".to_string()]
    );

    let root = tree.root(Taxonomy::Project, "demo").unwrap();
    assert_eq!(root.package_type, PackageType::ProjectBundle);
    assert_eq!(root.aversion, "1.1.0");
    assert_eq!(root.status, None);
    assert!(root.enable);

    let helper = tree.get(Taxonomy::Project, "demo", "helper").unwrap();
    assert_eq!(helper.version, "^1.0.0");
    assert_eq!(helper.aversion, "1.0.0");
    let expected_path: PathBuf = h
        .namespace
        .root()
        .join("Project/demo/helper@^1.0.0/node_modules/helper/package.json");
    assert_eq!(helper.path.as_deref(), Some(expected_path.to_str().unwrap()));

    // Persisted, and the child is now stale against its range
    assert_eq!(h.manager.store().read().unwrap(), tree);
    let views = h.manager.reconcile().await.unwrap();
    let helper = views.installed.get(Taxonomy::Project, "demo", "helper").unwrap();
    assert_eq!(helper.status, Some(InstallStatus::Outdate));
    assert_eq!(helper.latest_version, "1.0.4");
}

#[tokio::test]
async fn test_install_plugin_is_interim_until_confirmed() {
    let h = harness();
    let tree = h.manager.install_plugin("helper", "1.0.0").await.unwrap();
    let root = tree.root(Taxonomy::Plugin, "helper").unwrap();
    assert_eq!(root.status, Some(InstallStatus::Installing));

    assert!(h.manager.installed().unwrap().bucket(Taxonomy::Plugin, "helper").is_none());

    h.manager
        .set_status_or_enable(Taxonomy::Plugin, "helper", "helper", InstallStatus::Installed, Some(true))
        .unwrap();
    let bucket = h
        .manager
        .installed_bucket("helper", Taxonomy::Plugin)
        .unwrap()
        .unwrap();
    assert_eq!(bucket["helper"].status, Some(InstallStatus::Installed));
    assert_eq!(bucket["helper"].aversion, "1.0.0");
}

#[tokio::test]
async fn test_install_type_mismatch_is_validation_error() {
    let h = harness();
    assert!(matches!(
        h.manager.install_plugin("demo", "latest").await,
        Err(MarketError::Validation(_))
    ));
    assert!(matches!(
        h.manager.install_project("lodash", "latest").await,
        Err(MarketError::Validation(_))
    ));
    assert!(h.installer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_install_commits_nothing() {
    let h = harness_with(
        FakeCatalog::default().with(project_doc()).with(plugin_doc()),
        FakeAllowList::Names(Vec::new()),
        FakeInstaller {
            fail: Some("helper".to_string()),
            projects: vec!["demo"],
            ..Default::default()
        },
        MarketConfig::default(),
    );
    let err = h.manager.install_project("demo", "latest").await.unwrap_err();
    assert!(matches!(
        err,
        MarketError::Install(InstallError::ToolFailed { code: Some(1), .. })
    ));
    assert!(h.manager.store().read().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_update_on_missing_record_is_noop() {
    let h = harness();
    let tree = h
        .manager
        .set_status_or_enable(Taxonomy::Project, "ghost", "ghost", InstallStatus::Installed, Some(false))
        .unwrap();
    assert!(tree.is_empty());
}

#[tokio::test]
async fn test_uninstall_only_accepts_roots() {
    let h = harness();
    h.manager.install_project("demo", "latest").await.unwrap();
    let demo_dir = h.namespace.taxonomy_dir(Taxonomy::Project).join("demo");
    assert!(demo_dir.is_dir());

    let err = h.manager.uninstall("helper", Taxonomy::Project).await.unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
    let state = h.manager.store().read().unwrap();
    assert!(state.get(Taxonomy::Project, "demo", "helper").is_some());

    let tree = h.manager.uninstall("demo", Taxonomy::Project).await.unwrap();
    assert!(tree.bucket(Taxonomy::Project, "demo").is_none());
    assert!(!demo_dir.exists());
}

#[tokio::test]
async fn test_uninstall_with_missing_directory_clears_state() {
    let h = harness();
    let mut state = StateTree::new();
    state.insert(
        Taxonomy::Plugin,
        "helper",
        "helper",
        root_record("helper", PackageType::StandalonePlugin, "1.0.0"),
    );
    h.manager.store().update(&state, false).unwrap();

    let tree = h.manager.uninstall("helper", Taxonomy::Plugin).await.unwrap();
    assert!(tree.is_empty());
}

#[tokio::test]
async fn test_reset_clears_disk_and_state() {
    let h = harness();
    h.manager.install_project("demo", "latest").await.unwrap();

    let tree = h.manager.reset().await.unwrap();
    assert!(tree.is_empty());
    assert!(!h.namespace.taxonomy_dir(Taxonomy::Project).exists());
    assert!(h.manager.store().read().unwrap().is_empty());
}

#[tokio::test]
async fn test_seed_builtin_projects() {
    let h = harness();
    let manifest: Manifest = serde_json::from_value(json!({
        "name": "starter",
        "version": "0.3.0",
        "cygnus": {"isProject": true, "disableUninstall": true}
    }))
    .unwrap();

    let tree = h.manager.seed_builtin_projects(&[manifest]).unwrap();
    let starter = tree.root(Taxonomy::Project, "starter").unwrap();
    assert_eq!(starter.status, Some(InstallStatus::Installed));
    assert_eq!(starter.aversion, "0.3.0");
    assert!(starter.disable_uninstall);
    assert!(h.installer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_parent_of() {
    let h = harness();
    h.manager.install_project("demo", "latest").await.unwrap();

    let helper_dir = h
        .namespace
        .root()
        .join("Project/demo/helper@^1.0.0/node_modules/helper");
    assert_eq!(h.manager.parent_of(&helper_dir).unwrap().as_deref(), Some("demo"));
    assert!(matches!(
        h.manager.parent_of(Path::new("relative/dir")),
        Err(MarketError::Validation(_))
    ));
}

#[tokio::test]
async fn test_install_plan_preview() {
    let h = harness();
    let plan = h.manager.install_plan("demo", "1.0.0").await.unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].version, "1.0.0");
    assert!(h.installer.calls.lock().unwrap().is_empty());
}
