//! Embedded schema migrations.

use anyhow::anyhow;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use super::connection::connect_sqlite;

/// Embedded Diesel migrations bundled with this crate.
///
/// These are applied by [`run_sqlite`] to bring the database schema up to date.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs pending Diesel migrations on the SQLite database at the given URL.
///
/// Accepts a bare path or a `sqlite:` URL; PostgreSQL URLs are rejected.
pub fn run_sqlite(url: &str) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use diesel::connection::SimpleConnection;

    #[test]
    fn migrations_apply_on_temp_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let path = temp.path().to_string_lossy().to_string();

        run_sqlite(&path).expect("migration run");
        // idempotent
        run_sqlite(&path).expect("second migration run");

        let mut conn = connect_sqlite(&path).unwrap();
        conn.batch_execute(
            "INSERT INTO timezones (store_id, timezone_str) VALUES ('s1', 'America/Denver')",
        )
        .unwrap();
    }
}
