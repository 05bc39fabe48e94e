//! SQLite connection helpers.
//!
//! Provides [`connect_sqlite`] that opens a connection and applies recommended PRAGMAs:
//! WAL journaling, foreign_keys=ON, and a 5000ms busy_timeout. Connections are cheap and
//! are opened per operation, then dropped.
//!
//! Example:
//! ```no_run
//! use store_uptime::db::connection::connect_sqlite;
//!
//! let path = std::env::temp_dir().join("store_uptime_example.db");
//! let _conn = connect_sqlite(path.to_str().unwrap()).expect("open sqlite");
//! ```

use anyhow::{Context, bail};
use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};

/// Strip an optional `sqlite:`/`sqlite://` scheme and reject other backends.
pub fn sqlite_path(database_url: &str) -> anyhow::Result<&str> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        bail!("Unsupported DATABASE_URL (only SQLite is supported): {database_url}");
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    if path.is_empty() {
        bail!("empty DATABASE_URL");
    }
    Ok(path)
}

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let path = sqlite_path(database_url)?;
    let mut conn = SqliteConnection::establish(path)
        .with_context(|| format!("opening sqlite database {path}"))?;

    // Better read concurrency while a report job is writing its status
    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    sql_query("PRAGMA foreign_keys=ON;").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(&mut conn)?;
    Ok(conn)
}
