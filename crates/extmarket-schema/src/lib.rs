//! Shared data shapes for the extension market: registry documents,
//! normalized records and the two-taxonomy tree.

pub mod manifest;
pub mod record;
pub mod tree;
pub mod types;
pub mod version;

// Re-exports
pub use manifest::{
    AllowListEntry, Manifest, MarketMeta, MetaDescription, PackageSummary, RegistryDocument,
    SearchResponse,
};
pub use record::{CatalogEntry, InstalledRecord, NormalizeError, RecordPatch};
pub use tree::{Bucket, CatalogTree, StateTree, Tree};
pub use types::*;
pub use version::PackageSpec;

/// Manifest key carrying the market marker object.
pub const MARKER_KEY: &str = "cygnus";
