//! Structural analysis of Python sources
//!
//! Symbol extraction, import resolution, the file dependency graph and
//! PageRank importance.

pub mod annotation;
pub mod dependencies;
pub mod extractor;
pub mod graph;
pub mod rank;

// Re-export commonly used items
pub use dependencies::{ModuleResolver, build_dependency_graph};
pub use extractor::PythonExtractor;
pub use graph::DependencyGraph;
pub use rank::{PageRank, Ranking};
