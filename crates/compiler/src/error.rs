//! Compilation errors.

use thiserror::Error;

use crate::ast::Span;

/// A front-end or code-generation error with its source position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("{line}:{column}: syntax error: {message}")]
    Syntax {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("{line}:{column}: error: {message}")]
    Codegen {
        message: String,
        line: u32,
        column: u32,
    },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        CompileError::Syntax {
            message: message.into(),
            line: span.start.line,
            column: span.start.column,
        }
    }

    pub fn codegen(message: impl Into<String>, span: Span) -> Self {
        CompileError::Codegen {
            message: message.into(),
            line: span.start.line,
            column: span.start.column,
        }
    }
}

/// Result type used throughout the compiler crate.
pub type CompileResult<T> = Result<T, CompileError>;
