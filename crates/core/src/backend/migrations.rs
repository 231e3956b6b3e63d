//! Schema versioning for the SQLite backend.
//!
//! Writable connections bring the schema up to [`LATEST_VERSION`]. Read-only
//! connections cannot migrate, so they only check that nothing is missing.

use tokio_rusqlite::{Connection, OptionalExtension, params, rusqlite};

use crate::Error;

/// Ordered `(version, SQL)` pairs. Every batch is idempotent.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_entries.sql"))];

/// Schema version produced by running every migration.
pub const LATEST_VERSION: i64 = MIGRATIONS[MIGRATIONS.len() - 1].0;

/// Highest applied version, or 0 for a database that was never migrated.
fn applied_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    let has_table = conn
        .query_row("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_migrations'", [], |_| Ok(()))
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }

    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
    Ok(version)
}

/// Apply pending migrations, one transaction per version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the version whose SQL failed.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current = applied_version(conn)?;
        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache schema migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Check that the schema is current without modifying it.
///
/// # Errors
///
/// Returns `Error::SchemaTooOld` if any migration is still pending.
pub async fn verify(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let found = applied_version(conn)?;
        if found < LATEST_VERSION {
            return Err(Error::SchemaTooOld { found, required: LATEST_VERSION });
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}
