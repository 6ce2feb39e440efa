//! Lexer and parser for the Sparklet script language
//!
//! Action bodies, helper bodies and `{{ }}` interpolation spans are all
//! parsed here into the AST executed by [`crate::runtime`].

pub mod ast;
pub mod error;
pub mod lexer;
pub mod statement_parser;

pub use ast::{Expression, FunctionDef, Program, Statement};
pub use error::SparkletError;
pub use lexer::{Lexer, Span, Token};
pub use statement_parser::{parse_expression, parse_statements, StatementParser};
