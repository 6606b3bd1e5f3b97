//! extm - extension market CLI
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Browse the extension catalog, install project bundles and plugins, and
//! keep the installed-state file in step with what is on disk.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.extmarket_<NAMESPACE>/
//! ├── Project/<root>/<child>@<version>/   # one install unit per directory
//! ├── Plugin/<root>/<child>@<version>/
//! └── installed-packages.json             # installed state
//! ~/.extmarket_BIN/bin/                   # runtime and install tool
//! ~/.extmarket/config.toml                # optional configuration
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use extmarket_schema::Taxonomy;

#[derive(Debug, Parser)]
#[command(name = "extm")]
#[command(author, version, about = "extm - extension market for project bundles and plugins")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Configuration file (defaults to ~/.extmarket/config.toml)
    #[arg(long, global = true, env = "EXTMARKET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Namespace suffix; installs live under ~/.extmarket_<NAMESPACE>
    #[arg(long, global = true, env = "EXTMARKET_NAMESPACE")]
    pub namespace: Option<String>,

    /// Show every catalog package, not only allow-listed ones
    #[arg(long, global = true)]
    pub ignore_whitelist: bool,

    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Which taxonomy a command targets.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct TaxonomyArg {
    /// Target a standalone plugin instead of a project bundle
    #[arg(long)]
    pub plugin: bool,
}

impl TaxonomyArg {
    pub fn taxonomy(self) -> Taxonomy {
        if self.plugin {
            Taxonomy::Plugin
        } else {
            Taxonomy::Project
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List catalog package names
    Search,
    /// Show catalog and installed packages with their status
    List {
        /// Only installed packages
        #[arg(long, conflicts_with = "available")]
        installed: bool,
        /// Only packages not installed yet
        #[arg(long)]
        available: bool,
        /// Print the views as JSON
        #[arg(long)]
        json: bool,
    },
    /// Install a package: name or name@version
    Install {
        /// Package spec (e.g. demo or demo@1.2.0)
        spec: String,
        #[command(flatten)]
        target: TaxonomyArg,
    },
    /// Remove an installed package and its bundled plugins
    Uninstall {
        /// Package name
        name: String,
        #[command(flatten)]
        target: TaxonomyArg,
        /// Remove even if the package is marked as not removable
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Enable an installed package
    Enable {
        /// Package name
        name: String,
        /// Root package the record lives under (defaults to the name itself)
        #[arg(long)]
        parent: Option<String>,
        #[command(flatten)]
        target: TaxonomyArg,
    },
    /// Disable an installed package
    Disable {
        /// Package name
        name: String,
        /// Root package the record lives under (defaults to the name itself)
        #[arg(long)]
        parent: Option<String>,
        #[command(flatten)]
        target: TaxonomyArg,
    },
    /// Print the installed package that owns a path
    Owner {
        /// Absolute path inside an install unit
        path: PathBuf,
    },
    /// Record bundled projects as installed without downloading them
    Seed {
        /// package.json files of the bundled projects
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },
    /// Delete every installed package and empty the state
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
