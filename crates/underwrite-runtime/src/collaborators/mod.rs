//! Outside services the pipeline talks to, with in-process reference
//! implementations.
//!
//! None of them affects pass/fail outcomes: a missing graph only reduces
//! context, and storage failures never fail an evaluation.

pub mod graph;
pub mod parser;
pub mod storage;

pub use graph::{GraphContext, GraphError, NoGraph, StaticGraph};
pub use parser::{DocumentParser, ParseError, ParsedDocument, PlainTextParser, Table};
pub use storage::{CheckStore, JsonFileStore, PolicyRecord, StorageError};
