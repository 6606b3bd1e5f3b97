//! Domain-specific errors for market operations

use std::path::PathBuf;

use extmarket_schema::NormalizeError;
use thiserror::Error;

use crate::reconcile::Reconciliation;

/// Persisted state file failures. A file that fails to parse is never an
/// error; it is moved aside and replaced.
#[derive(Error, Debug)]
pub enum StateError {
    /// Reading, writing or renaming the state file failed.
    #[error("IO error on state file: {0}")]
    Io(#[from] std::io::Error),

    /// The tree could not be serialized.
    #[error("Failed to encode state: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the state lock.
    #[error("State lock poisoned")]
    Lock,
}

/// Catalog and allow-list transport failures.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport failure or non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured URL could not be parsed.
    #[error("Request a bad url: {0}")]
    BadUrl(String),

    /// A registry document could not be normalized.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Toolchain download and unpack failures.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Archive download failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Writing the unpacked toolchain failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive could not be read.
    #[error("Corrupt archive {url}: {reason}")]
    CorruptArchive {
        /// Where the archive came from.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The URL has no known archive extension.
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Unpacking succeeded but the executable is not where configured.
    #[error("Expected binary missing after provisioning: {}", .0.display())]
    MissingBinary(PathBuf),
}

/// Failure of one unit install.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The install tool exited unsuccessfully.
    #[error("Install of {name} failed with exit code {}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ToolFailed {
        /// Package being installed.
        name: String,
        /// Exit code; `None` when killed by a signal.
        code: Option<i32>,
    },

    /// The runtime or install tool could not be provisioned.
    #[error("Toolchain setup failed: {0}")]
    Provision(#[from] ProvisionError),

    /// The install tool could not be started.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The coordinator worker exited before replying.
    #[error("Install queue worker has stopped")]
    WorkerGone,
}

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        /// Config file location.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::config::MarketConfig`].
    #[error("Invalid config {}: {source}", path.display())]
    Toml {
        /// Config file location.
        path: PathBuf,
        /// Parser message.
        source: toml::de::Error,
    },
}

/// Umbrella error returned by every engine operation.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Catalog or allow-list failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// State file failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// Unit install failure.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Filesystem failure outside the state file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller input was rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Any other failure, with the operation it happened in.
    #[error("{context}: {message}")]
    Context {
        /// Operation that failed.
        context: &'static str,
        /// What went wrong.
        message: String,
    },
}

impl MarketError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }
}

impl From<NormalizeError> for MarketError {
    fn from(err: NormalizeError) -> Self {
        Self::Catalog(CatalogError::Normalize(err))
    }
}

/// A reconciliation that failed, carrying the best-effort views a caller can
/// still render.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ReconcileFailure {
    /// Why reconciliation failed.
    #[source]
    pub error: MarketError,
    /// Views built from whatever data was available.
    pub fallback: Reconciliation,
}
