//! Text map format for compass

use anyhow::Result;
use std::io::Write;

use super::{Formatter, MapFile, RepoMap};
use crate::core::Symbol;

/// Elision marker between the header and the signatures of a file.
pub const ELLIPSIS: &str = "⋮...";

pub struct TextFormatter {
    first_file: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self { first_file: true }
    }
}

/// `│sig`, or `│ sig` for members of a class.
pub fn map_line(symbol: &Symbol) -> String {
    if symbol.parent.is_some() {
        format!("│ {}", symbol.signature)
    } else {
        format!("│{}", symbol.signature)
    }
}

/// One file block, trailing newline included.
pub fn render_file(file: &MapFile) -> String {
    let mut block = format!("{} (importance: {:.3}):\n{}\n", file.path, file.score, ELLIPSIS);
    for symbol in &file.symbols {
        block.push_str(&map_line(symbol));
        block.push('\n');
    }
    block
}

/// The whole text map, exactly as [`TextFormatter`] writes it.
pub fn render_map(map: &RepoMap) -> String {
    let mut out = String::new();
    for (i, file) in map.files.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&render_file(file));
    }
    if map.truncated && !map.files.is_empty() {
        out.push('\n');
        out.push_str(ELLIPSIS);
        out.push('\n');
    }
    out
}

impl Formatter for TextFormatter {
    fn write_header(&mut self, _output: &mut dyn Write, _map: &RepoMap) -> Result<()> {
        Ok(())
    }

    fn write_file(&mut self, output: &mut dyn Write, file: &MapFile) -> Result<()> {
        if !self.first_file {
            writeln!(output)?;
        }
        self.first_file = false;
        write!(output, "{}", render_file(file))?;
        Ok(())
    }

    fn write_footer(&mut self, output: &mut dyn Write, map: &RepoMap) -> Result<()> {
        if map.truncated && !self.first_file {
            writeln!(output)?;
            writeln!(output, "{}", ELLIPSIS)?;
        }
        Ok(())
    }
}
