//! Output Buffer - rows are queued and flushed in one write so a listing
//! never interleaves with log lines.

use crossterm::{
    QueueableCommand,
    style::{Color, SetForegroundColor},
};
use std::io::Write;

/// A buffer that accumulates terminal commands before flushing
pub struct OutputBuffer<W: Write = std::io::Stdout> {
    out: W,
}

impl<W: Write> std::fmt::Debug for OutputBuffer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer").finish_non_exhaustive()
    }
}

impl<W: Write> OutputBuffer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write text on a new line with color
    pub fn write_line(&mut self, text: &str, color: Color) {
        let _ = self.out.queue(SetForegroundColor(color));
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.queue(SetForegroundColor(Color::Reset));
    }

    /// Flush all queued commands to the terminal
    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(std::io::stdout())
    }
}
