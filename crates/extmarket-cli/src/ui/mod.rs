//! Terminal output.
//!
//! - [`theme`] - Colors, icons and column widths
//! - [`buffer`] - Buffered writes for whole listings
//! - [`list`] - Row formatting for `list` and `search`
//! - [`output`] - One-line status messages

pub mod buffer;
pub mod list;
pub mod output;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
