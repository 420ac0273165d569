//! Database access via DuckDB
//!
//! This module provides database connectivity using DuckDB as the query engine.
//! DuckDB can attach PostgreSQL, MySQL, SQLite, and DuckDB files read-only.

mod connection;
pub mod discover;
mod engine;

pub use connection::{
    is_read_only_statement, qualified_table, ConnectionProvider, DuckDbConnection, RowCallback,
    SourceConnection,
};
pub use engine::DatabaseEngine;
