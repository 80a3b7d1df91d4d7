//! Error types for the analysis pipeline

use thiserror::Error;

/// Why a file produced no structural record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },

    #[error("inconsistent indentation at line {line}, column {column}")]
    Indentation { line: usize, column: usize },

    #[error("source is not valid UTF-8")]
    Encoding,

    #[error("parser aborted before producing a tree")]
    Aborted,

    #[error("failed to load grammar: {0}")]
    Language(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;
