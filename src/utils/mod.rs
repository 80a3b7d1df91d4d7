//! Utility modules for compass
//!
//! - `analysis/` - Python extraction, import resolution, graph and ranking
//! - `cache` - persisted extraction records
//! - `tokens` - token counting for map budgets

pub mod analysis;
pub mod cache;
pub mod tokens;
