//! SQL-like query language: lexer, recursive-descent parser, AST, and an
//! executor that dispatches onto the storage engine (reads, schema
//! statements) or a pluggable write sink (inserts, which must go through
//! cluster routing and the local Raft leader).

pub mod ast;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod token;

pub use error::QueryError;
pub use executor::{Executor, WriteSink};
pub use parser::Parser;
