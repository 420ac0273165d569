//! Source connection seams
//!
//! A scan needs very little from a database: a read-only session, one scalar
//! query for the fetch limit, and a forward-only row iterator it can stop
//! between rows. [`SourceConnection`] captures exactly that, and
//! [`ConnectionProvider`] hands out ready connections.

use crate::error::{Error, Result};
use crate::schema::NativeValue;
use crate::types::{quote_identifier, StreamId};
use duckdb::types::Value as SqlValue;
use duckdb::Connection;

/// Statement keywords a read-only session accepts
const READ_ONLY_KEYWORDS: [&str; 7] =
    ["SELECT", "WITH", "VALUES", "FROM", "DESCRIBE", "SHOW", "SUMMARIZE"];

/// Per-row callback; returns `false` to stop iterating
pub type RowCallback<'a> = dyn FnMut(Vec<NativeValue>) -> Result<bool> + 'a;

/// One ready, authenticated database session
pub trait SourceConnection {
    /// Reject every statement that is not a query from now on
    fn set_read_only(&mut self) -> Result<()>;

    /// First column of the first row, `None` if the query returns no rows
    fn query_scalar(&mut self, sql: &str) -> Result<Option<NativeValue>>;

    /// Run a parameterized query and hand each row's first `width` values to
    /// `on_row`, one row at a time, until it returns `false` or rows run out
    ///
    /// SQL NULL is delivered as a null native value. Returns the number of
    /// rows handed to `on_row`.
    fn query_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        width: usize,
        on_row: &mut RowCallback<'_>,
    ) -> Result<usize>;
}

/// Source of connections, one per scan
pub trait ConnectionProvider: Send + Sync {
    type Connection: SourceConnection;

    /// Acquire a connection for the duration of one scan
    fn acquire(&self) -> Result<Self::Connection>;

    /// Catalog the source tables are attached under, if any
    fn catalog(&self) -> Option<&str> {
        None
    }

    /// Fully qualified, quoted table reference for a stream
    fn table_ref(&self, stream: &StreamId) -> String {
        qualified_table(self.catalog(), stream.namespace.as_deref(), &stream.name)
    }
}

/// Quote and join `catalog.namespace.name`, skipping absent parts
pub fn qualified_table(catalog: Option<&str>, namespace: Option<&str>, name: &str) -> String {
    catalog
        .into_iter()
        .chain(namespace)
        .chain(std::iter::once(name))
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Check whether a statement is a query a read-only session may run
pub fn is_read_only_statement(sql: &str) -> bool {
    let trimmed = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
    let keyword: String = trimmed
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();
    READ_ONLY_KEYWORDS.contains(&keyword.as_str())
}

// ============================================================================
// DuckDB Connection
// ============================================================================

/// Session on a DuckDB database
pub struct DuckDbConnection {
    conn: Connection,
    read_only: bool,
}

impl DuckDbConnection {
    /// Wrap a DuckDB connection
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            read_only: false,
        }
    }

    /// Whether the session has been marked read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Execute statements, subject to the read-only guard
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.guard(sql)?;
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn guard(&self, sql: &str) -> Result<()> {
        if self.read_only && !is_read_only_statement(sql) {
            return Err(Error::ReadOnly {
                statement: sql.trim().to_string(),
            });
        }
        Ok(())
    }
}

impl SourceConnection for DuckDbConnection {
    fn set_read_only(&mut self) -> Result<()> {
        self.read_only = true;
        Ok(())
    }

    fn query_scalar(&mut self, sql: &str) -> Result<Option<NativeValue>> {
        self.guard(sql)?;
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(NativeValue::Sql(row.get::<_, SqlValue>(0)?))),
            None => Ok(None),
        }
    }

    fn query_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        width: usize,
        on_row: &mut RowCallback<'_>,
    ) -> Result<usize> {
        self.guard(sql)?;
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;

        let mut delivered = 0;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get::<_, SqlValue>(i).map(NativeValue::Sql))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            delivered += 1;
            if !on_row(values)? {
                break;
            }
        }
        Ok(delivered)
    }
}

impl std::fmt::Debug for DuckDbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbConnection")
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
