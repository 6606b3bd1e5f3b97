//! Owner command

use std::path::Path;

use anyhow::{Context, Result};

use crate::GlobalArgs;
use crate::ui::Output;

/// Print the installed root that owns `path`
pub fn owner(global: &GlobalArgs, path: &Path) -> Result<()> {
    let manager = super::open_manager(global)?;
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read the working directory")?
            .join(path)
    };

    match manager.parent_of(&path)? {
        Some(root) => println!("{root}"),
        None => Output::new(global.quiet).info(&format!("No installed package owns {}", path.display())),
    }
    Ok(())
}
