//! Reconciliation and install orchestration for the extension market.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod installer;
pub mod manager;
pub mod paths;
pub mod process;
pub mod reconcile;
pub mod state;
pub mod toolchain;

pub use config::MarketConfig;
pub use coordinator::{DownloadCoordinator, PendingInstall};
pub use error::{
    CatalogError, ConfigError, InstallError, MarketError, ProvisionError, ReconcileFailure,
    StateError,
};
pub use installer::{InstalledUnit, PackageInstaller, UnitInstaller};
pub use manager::{Collaborators, PackageManager};
pub use paths::Namespace;
pub use reconcile::{PlanItem, Reconciliation};
pub use state::StateStore;
