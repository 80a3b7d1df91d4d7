//! Output format modules for compass

pub mod json;
pub mod text;

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::config::{CompassConfig, OutputFormat};
use crate::core::{FileOutcome, Symbol};
use crate::runner::IndexReport;
use crate::utils::tokens::TokenCounter;

/// A file as it appears in the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFile {
    pub path: String,
    pub score: f64,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

/// Size caps applied while the map is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapLimits {
    pub max_tokens: Option<usize>,
    pub max_files: Option<usize>,
    pub max_symbols_per_file: Option<usize>,
}

impl MapLimits {
    pub fn from_config(config: &CompassConfig) -> Self {
        Self {
            max_tokens: config.output.max_tokens,
            max_files: config.output.max_files,
            max_symbols_per_file: config.output.max_symbols_per_file,
        }
    }
}

/// Ranked symbol map of a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoMap {
    /// Highest importance first
    pub files: Vec<MapFile>,
    pub failed: Vec<FailedFile>,
    /// Tokens of the rendered text map
    pub token_count: usize,
    /// Whether a limit cut files or symbols
    pub truncated: bool,
}

impl RepoMap {
    pub fn build(report: &IndexReport, limits: &MapLimits) -> Self {
        Self::build_with(report, limits, &TokenCounter::new())
    }

    /// Walks files in rank order, keeping those with symbols until a limit
    /// is hit. A file that would overflow the token budget ends the map.
    pub fn build_with(report: &IndexReport, limits: &MapLimits, counter: &TokenCounter) -> Self {
        let mut map = RepoMap {
            failed: report
                .failed()
                .filter_map(|outcome| match outcome {
                    FileOutcome::Failed { path, error } => Some(FailedFile {
                        path: path.clone(),
                        error: error.clone(),
                    }),
                    _ => None,
                })
                .collect(),
            ..RepoMap::default()
        };

        let mut used = 0;
        for (path, score) in report.ranking.ordered() {
            let Some(file) = report.file(path) else {
                continue;
            };
            if file.symbols.is_empty() {
                continue;
            }
            if limits.max_files.is_some_and(|max| map.files.len() >= max) {
                map.truncated = true;
                break;
            }

            let mut symbols = file.symbols.clone();
            if let Some(max) = limits.max_symbols_per_file
                && symbols.len() > max
            {
                symbols.truncate(max);
                map.truncated = true;
            }

            let entry = MapFile {
                path: path.to_string(),
                score,
                symbols,
            };
            // A blank line separates each block from the previous one.
            let separator = if map.files.is_empty() { 0 } else { counter.count("\n") };
            let tokens = separator + counter.count(&text::render_file(&entry));
            if limits
                .max_tokens
                .is_some_and(|budget| used + tokens > budget)
            {
                tracing::debug!(path, tokens, "token budget reached");
                map.truncated = true;
                break;
            }
            used += tokens;
            map.files.push(entry);
        }

        // The elision footer and token merges across blocks are only known
        // once the map is complete, so the budget is settled on the real text.
        map.token_count = counter.count(&text::render_map(&map));
        if let Some(budget) = limits.max_tokens {
            while map.token_count > budget && map.files.pop().is_some() {
                map.truncated = true;
                map.token_count = counter.count(&text::render_map(&map));
            }
        }
        map
    }

    pub fn write(&self, format: OutputFormat, output: &mut dyn Write) -> Result<()> {
        let mut formatter = create_formatter(format);
        formatter.write_header(output, self)?;
        for file in &self.files {
            formatter.write_file(output, file)?;
        }
        formatter.write_footer(output, self)
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(format, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub trait Formatter {
    fn write_header(&mut self, output: &mut dyn Write, map: &RepoMap) -> Result<()>;

    fn write_file(&mut self, output: &mut dyn Write, file: &MapFile) -> Result<()>;

    fn write_footer(&mut self, output: &mut dyn Write, map: &RepoMap) -> Result<()>;
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(text::TextFormatter::new()),
        OutputFormat::Json => Box::new(json::JsonFormatter::new()),
    }
}
