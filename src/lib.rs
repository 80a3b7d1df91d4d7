pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod fs;
pub mod runner;
pub mod utils;

// Re-export key items for convenience
pub use config::{CompassConfig, OutputFormat};
pub use core::{Extraction, FileOutcome, ImportRef, ScanEvent, SourceFile, Symbol, SymbolKind};
pub use error::ExtractError;
pub use format::RepoMap;
pub use runner::{AnalysisOptions, IndexReport, analyze_sources, index_project, run};
pub use utils::analysis::{
    DependencyGraph, ModuleResolver, PageRank, PythonExtractor, Ranking, build_dependency_graph,
};
