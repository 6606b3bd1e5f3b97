//! extm - extension market CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use extmarket_cli::cmd;
use extmarket_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so list/search output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Cli { global, command } = Cli::parse();

    match command {
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
        Commands::Search => cmd::search::search(&global).await,
        Commands::List {
            installed,
            available,
            json,
        } => cmd::list::list(&global, cmd::list::View::pick(installed, available), json).await,
        Commands::Install { spec, target } => {
            cmd::install::install(&global, &spec, target.taxonomy()).await
        }
        Commands::Uninstall {
            name,
            target,
            force,
        } => cmd::uninstall::uninstall(&global, &name, target.taxonomy(), force).await,
        Commands::Enable {
            name,
            parent,
            target,
        } => cmd::toggle::toggle(&global, &name, parent.as_deref(), target.taxonomy(), true),
        Commands::Disable {
            name,
            parent,
            target,
        } => cmd::toggle::toggle(&global, &name, parent.as_deref(), target.taxonomy(), false),
        Commands::Owner { path } => cmd::owner::owner(&global, &path),
        Commands::Seed { manifests } => cmd::seed::seed(&global, &manifests),
        Commands::Reset { yes } => cmd::reset::reset(&global, yes).await,
    }
}
