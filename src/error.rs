//! Error types for lexing, parsing and evaluating templates.

use thiserror::Error;

use crate::reader::Position;

/// Everything that can abort a render call.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Malformed template source, detected by the lexer or the parser.
    #[error("{line}:{column}: syntax error: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    /// Failure while evaluating a well-formed template.
    #[error("{line}:{column}: semantic error: {kind}")]
    Semantic {
        kind: SemanticError,
        line: usize,
        column: usize,
    },

    /// The template source stream itself could not be read.
    #[error("failed to read template source: {0}")]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    pub fn syntax(message: impl Into<String>, pos: Position) -> Self {
        TemplateError::Syntax {
            message: message.into(),
            line: pos.line,
            column: pos.column,
        }
    }

    pub fn semantic(kind: SemanticError, pos: Position) -> Self {
        TemplateError::Semantic {
            kind,
            line: pos.line,
            column: pos.column,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, TemplateError::Syntax { .. })
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, TemplateError::Semantic { .. })
    }

    /// The evaluation failure, if this is a semantic error.
    pub fn semantic_kind(&self) -> Option<&SemanticError> {
        match self {
            TemplateError::Semantic { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Source position the error is attributed to.
    pub fn position(&self) -> Option<Position> {
        match self {
            TemplateError::Syntax { line, column, .. }
            | TemplateError::Semantic { line, column, .. } => Some(Position::new(*line, *column)),
            TemplateError::Io(_) => None,
        }
    }
}

/// Reasons evaluation can fail. Positions are attached by the evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("unsupported operand types for {op}: {left} and {right}")]
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("bad operand type for unary {op}: {operand}")]
    UnsupportedOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("'in' is not supported between {needle} and {haystack}")]
    InvalidMembership {
        needle: &'static str,
        haystack: &'static str,
    },

    #[error("{0} is not iterable")]
    NotIterable(&'static str),

    #[error("{target} cannot be indexed by {index}")]
    NotIndexable {
        target: &'static str,
        index: &'static str,
    },

    #[error("'{0}' is not a macro")]
    NotCallable(String),

    #[error("macro '{name}' takes {expected} argument(s) but {found} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("integer overflow")]
    Overflow,

    #[error("repeated string would exceed {0} bytes")]
    StringTooLong(usize),

    #[error("macro calls nested deeper than {0}")]
    RecursionLimit(usize),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
