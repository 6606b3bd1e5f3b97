//! Runtime and install-tool provisioning.
//!
//! Archives (`.zip`, `.tar.gz`, `.tgz`) are downloaded into the shared toolchain
//! directory only when the expected executables are missing.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::try_join_all;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::config::ToolchainConfig;
use crate::error::ProvisionError;
use crate::paths::filename_from_url;

/// Resolved executables for one install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Install tool executable.
    pub tool: PathBuf,
    /// Directory holding the runtime executable; prepended to `PATH`.
    pub runtime_dir: PathBuf,
}

/// Supplies the runtime and install tool for unit installs.
#[async_trait]
pub trait RuntimeProvisioner: Send + Sync {
    /// Make sure the runtime and install tool exist, downloading them if needed.
    async fn ensure_toolchain(&self) -> Result<Toolchain, ProvisionError>;
}

/// Provisioner that downloads archives and unpacks them in place.
#[derive(Debug, Clone)]
pub struct ArchiveProvisioner {
    client: Client,
    install_dir: PathBuf,
    config: ToolchainConfig,
}

impl ArchiveProvisioner {
    /// Provisioner unpacking into `install_dir`.
    pub fn new(client: Client, install_dir: impl Into<PathBuf>, config: ToolchainConfig) -> Self {
        Self {
            client,
            install_dir: install_dir.into(),
            config,
        }
    }

    fn toolchain(&self) -> Toolchain {
        let runtime = self.install_dir.join(&self.config.runtime_exe);
        Toolchain {
            tool: self.install_dir.join(&self.config.tool_exe),
            runtime_dir: runtime
                .parent()
                .map_or_else(|| self.install_dir.clone(), Path::to_path_buf),
        }
    }

    /// Download and unpack one artifact, retrying once when the archive is corrupt.
    async fn fetch_artifact(&self, url: &str) -> Result<(), ProvisionError> {
        match self.download_and_unpack(url).await {
            Err(ProvisionError::CorruptArchive { reason, .. }) => {
                tracing::warn!("Corrupt archive from {url} ({reason}), trying once more");
                self.download_and_unpack(url).await
            }
            other => other,
        }
    }

    async fn download_and_unpack(&self, url: &str) -> Result<(), ProvisionError> {
        let format = ArchiveFormat::from_url(url)?;
        tokio::fs::create_dir_all(&self.install_dir).await?;

        tracing::debug!("Downloading {url}");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::catalog::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        let tmp = tempfile::NamedTempFile::new_in(&self.install_dir)?;
        let mut file = tokio::fs::File::from_std(tmp.reopen()?);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);

        let archive = tmp.into_temp_path();
        let dest = self.install_dir.clone();
        let url_owned = url.to_string();
        tokio::task::spawn_blocking(move || unpack(format, &archive, &dest, &url_owned))
            .await
            .map_err(io::Error::other)??;

        tracing::debug!("Unpacked {}", filename_from_url(url));
        Ok(())
    }
}

#[async_trait]
impl RuntimeProvisioner for ArchiveProvisioner {
    async fn ensure_toolchain(&self) -> Result<Toolchain, ProvisionError> {
        let runtime_exe = self.install_dir.join(&self.config.runtime_exe);
        let toolchain = self.toolchain();

        let mut queue = Vec::new();
        if !runtime_exe.exists() {
            queue.push(self.config.runtime_url.as_str());
        }
        if !toolchain.tool.exists() && !self.config.tool_url.is_empty() {
            queue.push(self.config.tool_url.as_str());
        }

        if !queue.is_empty() {
            try_join_all(queue.iter().map(|url| self.fetch_artifact(url))).await?;
            tracing::info!("Provisioned toolchain in {}", self.install_dir.display());
        }

        for exe in [&runtime_exe, &toolchain.tool] {
            if !exe.exists() {
                return Err(ProvisionError::MissingBinary(exe.clone()));
            }
        }
        Ok(toolchain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    fn from_url(url: &str) -> Result<Self, ProvisionError> {
        let name = filename_from_url(url);
        if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else {
            Err(ProvisionError::UnsupportedFormat(name.to_string()))
        }
    }
}

fn corrupt(url: &str, reason: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::CorruptArchive {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn classify_io(url: &str, err: io::Error) -> ProvisionError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            corrupt(url, err)
        }
        _ => ProvisionError::Io(err),
    }
}

fn unpack(format: ArchiveFormat, archive: &Path, dest: &Path, url: &str) -> Result<(), ProvisionError> {
    let file = File::open(archive)?;
    match format {
        ArchiveFormat::TarGz => {
            let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
            tar::Archive::new(decoder)
                .unpack(dest)
                .map_err(|e| classify_io(url, e))
        }
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| classify_zip(url, e))?;
            zip.extract(dest).map_err(|e| classify_zip(url, e))
        }
    }
}

fn classify_zip(url: &str, err: zip::result::ZipError) -> ProvisionError {
    match err {
        zip::result::ZipError::Io(e) => classify_io(url, e),
        other => corrupt(url, other),
    }
}
