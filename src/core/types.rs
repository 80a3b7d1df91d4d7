//! Core types shared across compass modules

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::ExtractError;

/// Language tag stamped on every extracted file.
pub const PYTHON: &str = "python";

/// Events emitted during the indexing process
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Indexing has started
    StartScanning,
    /// Number of source files discovered
    FilesFound(usize),
    /// A file went through extraction (or was served from the cache)
    FileProcessed(PathBuf),
    /// A file could not be parsed
    FileFailed(PathBuf, String),
    /// Indexing complete with message
    Complete(String),
}

/// Kind of a structural declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
}

impl SymbolKind {
    /// Whether symbols of this kind may own other symbols through `parent`.
    pub fn is_class_like(self) -> bool {
        matches!(self, SymbolKind::Class)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named declaration extracted from a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based, inclusive
    pub line_start: usize,
    /// 1-based, inclusive, never below `line_start`
    pub line_end: usize,
    /// Single-line rendering of the declaration header
    pub signature: String,
    /// Name of the enclosing class, if any
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// `import a.b`
    Import,
    /// `from a import b`
    From,
}

/// One import statement (or one module of a multi-module `import`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRef {
    /// Dotted module path; empty for `from . import x`
    pub raw_module: String,
    /// Leading dots of a relative import; 0 for absolute imports
    pub relative_level: usize,
    pub kind: ImportKind,
    /// Names bound by a from-import; empty for plain imports
    pub imported_names: BTreeSet<String>,
}

impl ImportRef {
    pub fn plain(module: impl Into<String>) -> Self {
        Self {
            raw_module: module.into(),
            relative_level: 0,
            kind: ImportKind::Import,
            imported_names: BTreeSet::new(),
        }
    }

    pub fn from_import<I, S>(module: impl Into<String>, relative_level: usize, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            raw_module: module.into(),
            relative_level,
            kind: ImportKind::From,
            imported_names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative_level > 0
    }
}

/// Structural record of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Project-relative, `/`-separated; unique key
    pub path: String,
    pub language: String,
    pub content_hash: String,
    pub byte_size: u64,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportRef>,
}

impl SourceFile {
    /// A record with identity only: what an unparseable file contributes.
    pub fn empty(path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            language: PYTHON.to_string(),
            content_hash: content_hash(content),
            byte_size: content.len() as u64,
            symbols: Vec::new(),
            imports: Vec::new(),
        }
    }
}

/// Lowercase hex MD5 of the raw file bytes.
pub fn content_hash(content: &[u8]) -> String {
    let mut context = md5::Context::new();
    context.consume(content);
    format!("{:x}", context.finalize())
}

/// Result of extracting one file.
///
/// A syntactically broken file is ordinary data: `Failed` still carries the
/// file's identity (with no symbols and no imports) so the batch can report
/// it and keep it as a graph node.
#[derive(Debug, Clone)]
pub enum Extraction {
    Parsed(SourceFile),
    Failed {
        file: SourceFile,
        error: ExtractError,
    },
}

impl Extraction {
    pub fn file(&self) -> &SourceFile {
        match self {
            Extraction::Parsed(file) | Extraction::Failed { file, .. } => file,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Extraction::Parsed(_))
    }

    pub fn error(&self) -> Option<&ExtractError> {
        match self {
            Extraction::Parsed(_) => None,
            Extraction::Failed { error, .. } => Some(error),
        }
    }
}

/// Per-file status of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Extracted { path: String },
    Cached { path: String },
    Failed { path: String, error: String },
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Extracted { path }
            | FileOutcome::Cached { path }
            | FileOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_md5() {
        assert_eq!(content_hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }

    #[test]
    fn test_empty_source_file() {
        let file = SourceFile::empty("pkg/mod.py", b"def broken(\n");
        assert_eq!(file.language, PYTHON);
        assert_eq!(file.byte_size, 12);
        assert!(file.symbols.is_empty());
        assert!(file.imports.is_empty());
    }

    #[test]
    fn test_symbol_kind_serializes_lowercase() {
        let json = serde_json::to_string(&SymbolKind::Method).unwrap();
        assert_eq!(json, "\"method\"");
        assert!(SymbolKind::Class.is_class_like());
        assert!(!SymbolKind::Function.is_class_like());
    }
}
