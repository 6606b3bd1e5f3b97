//! Single-unit installs through the external tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::NetworkClassifier;
use crate::config::Registries;
use crate::error::InstallError;
use crate::process::{ProcessRunner, ToolCommand};
use crate::toolchain::RuntimeProvisioner;

/// Outcome of one successful unit install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledUnit {
    /// Package name.
    pub name: String,
    /// The version request the unit was installed with.
    pub version: String,
    /// Working directory the tool ran in.
    pub path: PathBuf,
}

/// Installs exactly one `name@version` into a working directory.
#[async_trait]
pub trait UnitInstaller: Send + Sync {
    /// Install `name@version` with `work_dir` as the tool's working directory.
    async fn install(
        &self,
        work_dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<InstalledUnit, InstallError>;
}

/// Runs `<tool> install <name>@<version> --registry=<endpoint>`.
pub struct PackageInstaller {
    runner: Arc<dyn ProcessRunner>,
    provisioner: Arc<dyn RuntimeProvisioner>,
    classifier: Arc<dyn NetworkClassifier>,
    registries: Registries,
}

impl std::fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("registries", &self.registries)
            .finish_non_exhaustive()
    }
}

impl PackageInstaller {
    /// Installer running the tool through `runner`.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        provisioner: Arc<dyn RuntimeProvisioner>,
        classifier: Arc<dyn NetworkClassifier>,
        registries: Registries,
    ) -> Self {
        Self {
            runner,
            provisioner,
            classifier,
            registries,
        }
    }
}

#[async_trait]
impl UnitInstaller for PackageInstaller {
    async fn install(
        &self,
        work_dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<InstalledUnit, InstallError> {
        let version = if version.is_empty() { "latest" } else { version };
        let restricted = self.classifier.is_restricted_network().await;
        let registry = &self.registries.select(restricted).registry;
        let toolchain = self.provisioner.ensure_toolchain().await?;

        let command = ToolCommand {
            program: toolchain.tool,
            args: vec![
                "install".to_string(),
                format!("{name}@{version}"),
                format!("--registry={registry}"),
            ],
            cwd: work_dir.to_path_buf(),
            path_prefix: Some(toolchain.runtime_dir),
            label: name.to_string(),
        };

        tracing::debug!("Running install of {name}@{version} in {}", work_dir.display());
        let code = match self.runner.run(&command).await {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!("Install tool failed to start for {name}: {e}");
                None
            }
        };

        if code == Some(0) {
            tracing::info!("Installed {name}@{version}");
            Ok(InstalledUnit {
                name: name.to_string(),
                version: version.to_string(),
                path: work_dir.to_path_buf(),
            })
        } else {
            Err(InstallError::ToolFailed {
                name: name.to_string(),
                code,
            })
        }
    }
}
