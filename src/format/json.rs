//! JSON map format for compass

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use super::{FailedFile, Formatter, MapFile, RepoMap};
use crate::core::Symbol;

/// Buffers files and writes one document in the footer.
#[derive(Default)]
pub struct JsonFormatter {
    files: Vec<String>,
    symbols: BTreeMap<String, Vec<Symbol>>,
    scores: BTreeMap<String, f64>,
}

#[derive(Serialize)]
struct MapDocument<'a> {
    files: &'a [String],
    symbols: &'a BTreeMap<String, Vec<Symbol>>,
    scores: &'a BTreeMap<String, f64>,
    failed: &'a [FailedFile],
    token_count: usize,
    truncated: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Formatter for JsonFormatter {
    fn write_header(&mut self, _output: &mut dyn Write, _map: &RepoMap) -> Result<()> {
        self.files.clear();
        self.symbols.clear();
        self.scores.clear();
        Ok(())
    }

    fn write_file(&mut self, _output: &mut dyn Write, file: &MapFile) -> Result<()> {
        self.files.push(file.path.clone());
        self.symbols.insert(file.path.clone(), file.symbols.clone());
        self.scores.insert(file.path.clone(), file.score);
        Ok(())
    }

    fn write_footer(&mut self, output: &mut dyn Write, map: &RepoMap) -> Result<()> {
        let doc = MapDocument {
            files: &self.files,
            symbols: &self.symbols,
            scores: &self.scores,
            failed: &map.failed,
            token_count: map.token_count,
            truncated: map.truncated,
        };
        serde_json::to_writer_pretty(&mut *output, &doc)?;
        writeln!(output)?;
        Ok(())
    }
}
