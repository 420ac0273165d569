//! DuckDB-based database engine
//!
//! Provides unified read-only access to PostgreSQL, MySQL, SQLite and DuckDB
//! files by attaching them to an in-memory DuckDB through its extensions.
//! Each scan gets its own cloned connection.

use super::connection::{qualified_table, ConnectionProvider, DuckDbConnection};
use super::discover;
use crate::config::{DatabaseConfig, DatabaseKind};
use crate::error::{Error, Result};
use crate::schema::JsonSchema;
use crate::types::StreamId;
use duckdb::Connection;
use std::sync::{Mutex, MutexGuard};

/// Catalog name external databases are attached under
const SOURCE_CATALOG: &str = "source_db";

/// Database engine using DuckDB
pub struct DatabaseEngine {
    /// Root DuckDB connection; scans use clones of it
    conn: Mutex<Connection>,
    /// Database type
    kind: DatabaseKind,
    /// Connection string used (for logging)
    connection_string: String,
    /// Catalog the source is attached under
    catalog: Option<String>,
}

impl DatabaseEngine {
    /// Create an engine and attach the configured source read-only
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;

        let connection_string = config.resolved_connection_string();
        let attached = attach_database(&conn, config.engine, &connection_string)?;

        tracing::info!(
            engine = %config.engine,
            attached,
            "Database engine ready"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            kind: config.engine,
            connection_string,
            catalog: attached.then(|| SOURCE_CATALOG.to_string()),
        })
    }

    /// Engine over an empty in-memory DuckDB database
    pub fn in_memory() -> Result<Self> {
        Self::new(&DatabaseConfig::in_memory())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("DuckDB connection mutex poisoned".to_string()))
    }

    /// Run setup statements on the root connection
    ///
    /// Not subject to the read-only guard; scans never use this path.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Test database connection
    pub fn check_connection(&self) -> Result<()> {
        let query = match self.kind {
            DatabaseKind::Postgres => "SELECT 1 FROM source_db.pg_catalog.pg_tables LIMIT 1",
            DatabaseKind::Mysql => "SELECT 1 FROM source_db.information_schema.tables LIMIT 1",
            DatabaseKind::Sqlite => "SELECT 1 FROM source_db.sqlite_master LIMIT 1",
            DatabaseKind::Duckdb => "SELECT 1",
        };

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(query)
            .map_err(|e| Error::config(format!("Connection check failed: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| Error::config(format!("Connection check failed: {e}")))?;
        rows.next()
            .map_err(|e| Error::config(format!("Connection check failed: {e}")))?;
        Ok(())
    }

    /// Get list of tables in the source, as `namespace.name`
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let catalog = self.catalog.as_deref().unwrap_or("memory");
        let query = match self.kind {
            DatabaseKind::Postgres => {
                "SELECT table_schema || '.' || table_name AS full_name
                 FROM information_schema.tables
                 WHERE table_catalog = ?
                   AND table_schema NOT IN ('pg_catalog', 'information_schema')
                 ORDER BY table_schema, table_name"
            }
            DatabaseKind::Mysql => {
                "SELECT table_schema || '.' || table_name AS full_name
                 FROM information_schema.tables
                 WHERE table_catalog = ?
                   AND table_schema NOT IN ('mysql', 'information_schema', 'performance_schema', 'sys')
                 ORDER BY table_schema, table_name"
            }
            DatabaseKind::Sqlite | DatabaseKind::Duckdb => {
                "SELECT table_schema || '.' || table_name AS full_name
                 FROM information_schema.tables
                 WHERE table_catalog = ?
                 ORDER BY table_schema, table_name"
            }
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(query)?;
        let tables = stmt
            .query_map(duckdb::params![catalog], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    /// Describe a stream's columns as a JSON schema
    pub fn discover(&self, stream: &StreamId) -> Result<JsonSchema> {
        let table = self.table_ref(stream);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {table}"))?;
        let columns = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(stream = %stream, columns = columns.len(), "Discovered columns");
        Ok(discover::schema_from_columns(
            columns.iter().map(|(name, ty)| (name.as_str(), ty.as_str())),
        ))
    }

    /// Get database type
    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    /// Get connection string (for logging - password masked)
    pub fn connection_info(&self) -> String {
        let conn_str = &self.connection_string;
        let scheme_end = conn_str.find("://").map_or(0, |pos| pos + 3);
        if let Some(at_pos) = conn_str[scheme_end..].find('@').map(|pos| pos + scheme_end) {
            if let Some(colon_pos) = conn_str[scheme_end..at_pos].rfind(':') {
                let colon_pos = colon_pos + scheme_end;
                return format!("{}****{}", &conn_str[..=colon_pos], &conn_str[at_pos..]);
            }
        }
        conn_str.clone()
    }
}

impl ConnectionProvider for DatabaseEngine {
    type Connection = DuckDbConnection;

    fn acquire(&self) -> Result<DuckDbConnection> {
        let conn = self.lock()?.try_clone()?;
        Ok(DuckDbConnection::new(conn))
    }

    fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    fn table_ref(&self, stream: &StreamId) -> String {
        let namespace = match (self.kind, stream.namespace.as_deref()) {
            (DatabaseKind::Postgres, None) => Some("public"),
            (_, namespace) => namespace,
        };
        qualified_table(self.catalog(), namespace, &stream.name)
    }
}

impl std::fmt::Debug for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseEngine")
            .field("kind", &self.kind)
            .field("connection", &self.connection_info())
            .field("catalog", &self.catalog)
            .finish()
    }
}

/// Attach the source database read-only; returns whether anything was attached
fn attach_database(conn: &Connection, kind: DatabaseKind, connection_string: &str) -> Result<bool> {
    let escaped = connection_string.replace('\'', "''");
    let (extension, attach_sql) = match kind {
        DatabaseKind::Postgres => (
            Some("postgres"),
            format!("ATTACH '{escaped}' AS {SOURCE_CATALOG} (TYPE POSTGRES, READ_ONLY);"),
        ),
        DatabaseKind::Mysql => (
            Some("mysql"),
            format!("ATTACH '{escaped}' AS {SOURCE_CATALOG} (TYPE MYSQL, READ_ONLY);"),
        ),
        DatabaseKind::Sqlite => (
            Some("sqlite"),
            format!("ATTACH '{escaped}' AS {SOURCE_CATALOG} (TYPE SQLITE, READ_ONLY);"),
        ),
        DatabaseKind::Duckdb => {
            if connection_string == ":memory:" {
                return Ok(false);
            }
            (
                None,
                format!("ATTACH '{escaped}' AS {SOURCE_CATALOG} (READ_ONLY);"),
            )
        }
    };

    if let Some(extension) = extension {
        conn.execute_batch(&format!("INSTALL {extension}; LOAD {extension};"))
            .map_err(|e| Error::config(format!("Failed to load {extension} extension: {e}")))?;
    }
    conn.execute_batch(&attach_sql)
        .map_err(|e| Error::config(format!("Failed to attach {kind} database: {e}")))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SourceConnection;

    #[test]
    fn test_in_memory_engine() {
        let engine = DatabaseEngine::in_memory().unwrap();
        engine.check_connection().unwrap();
        assert_eq!(engine.catalog(), None);
        assert_eq!(engine.kind(), DatabaseKind::Duckdb);
        assert_eq!(engine.table_ref(&StreamId::new("t")), "\"t\"");
    }

    #[test]
    fn test_acquired_connections_share_the_database() {
        let engine = DatabaseEngine::in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE users (id INTEGER); INSERT INTO users VALUES (1), (2);")
            .unwrap();

        let mut conn = engine.acquire().unwrap();
        conn.set_read_only().unwrap();
        let count = conn.query_scalar("SELECT count(*) FROM users").unwrap();
        assert_eq!(
            count,
            Some(crate::schema::NativeValue::Sql(duckdb::types::Value::BigInt(2)))
        );
        assert!(conn.execute_batch("DROP TABLE users").is_err());
    }

    #[test]
    fn test_list_tables_and_discover() {
        let engine = DatabaseEngine::in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE SCHEMA shop;
                 CREATE TABLE shop.orders (id BIGINT, paid BOOLEAN, tags VARCHAR[], \"at\" TIMESTAMP);",
            )
            .unwrap();

        assert_eq!(engine.list_tables().unwrap(), vec!["shop.orders".to_string()]);

        let schema = engine
            .discover(&StreamId::with_namespace("shop", "orders"))
            .unwrap();
        assert_eq!(schema.properties.len(), 4);
        assert!(schema.get_property("tags").unwrap().items.is_some());
    }

    #[test]
    fn test_postgres_defaults_to_public_schema() {
        let engine = DatabaseEngine {
            conn: Mutex::new(Connection::open_in_memory().unwrap()),
            kind: DatabaseKind::Postgres,
            connection_string: "postgresql://reader:secret@db:5432/shop".to_string(),
            catalog: Some(SOURCE_CATALOG.to_string()),
        };
        assert_eq!(
            engine.table_ref(&StreamId::new("orders")),
            "\"source_db\".\"public\".\"orders\""
        );
        assert_eq!(engine.connection_info(), "postgresql://reader:****@db:5432/shop");
    }
}
