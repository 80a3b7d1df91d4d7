//! Core module for compass
//!
//! This module contains the core types and the file scanner.

pub mod scanner;
mod types;

pub use scanner::{DiscoveredFile, discover_files};
pub use types::*;
