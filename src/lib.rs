//! htmpl: a small Jinja-flavoured template engine for HTML documents.
//!
//! A template is literal markup interleaved with three kinds of regions:
//!
//! - `{{ expression }}` prints the value of an expression.
//! - `{% statement %}` runs `if`/`elif`/`else`, `for`, `set` and `macro`.
//! - `{# comment #}` is dropped from the output.
//!
//! Rendering is a three-stage pipeline: the lexer switches between text,
//! code and comment modes while tracking line/column positions, the parser
//! builds a tree with explicit operator precedence, and the evaluator walks
//! that tree against a stack of scopes whose bottom frame holds the external
//! data model (see [`model`]).
//!
//! Supported expressions:
//! - Literals: integers, floats, single- or double-quoted strings (no
//!   escapes), `True`, `False`.
//! - Arithmetic `+ - * / %`, comparisons `== != < <= > >=`, membership
//!   `in`, logic `and or not`.
//! - Indexing `x[0]`, `x['key']`, `x.key`, and macro calls `m(a, b)`.
//!
//! Failures are all-or-nothing: a render either returns the full output or
//! a single [`TemplateError`] pointing at the offending source position.
//!
//! ```
//! use htmpl::{render_str, Model, Value};
//!
//! let mut model = Model::new();
//! model.insert("name".into(), Value::from("World"));
//! let out = render_str("<b>Hello {{ name }}</b>", Some(model)).unwrap();
//! assert_eq!(out, "<b>Hello World</b>");
//! ```

use std::io::BufRead;

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod reader;
pub mod scope;
pub mod value;

pub use ast::Template;
pub use error::{Result, SemanticError, TemplateError};
pub use eval::Evaluator;
pub use lexer::{Lexer, Token, TokenKind};
pub use model::{load_model, Model, ModelError};
pub use parser::Parser;
pub use reader::Position;
pub use scope::ScopeStack;
pub use value::Value;

/// Parses and renders a template read from `source`.
///
/// The whole document is parsed before evaluation starts, so a syntax error
/// anywhere means no output at all.
pub fn render<R: BufRead>(source: R, model: Option<Model>) -> Result<String> {
    Template::parse(source)?.render(model)
}

/// [`render`] for an in-memory template.
pub fn render_str(template: &str, model: Option<Model>) -> Result<String> {
    render(template.as_bytes(), model)
}
