//! Connection bootstrap for the SQLite driver.
//!
//! # Invariants
//! - Returned connections have every bootstrap migration applied.
//! - Every open attempt emits exactly one terminal `db_open` event.

use super::migrations::apply_migrations;
use crate::driver::DriverResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const IN_MEMORY_PATH: &str = ":memory:";

/// Opens (or creates) the database at `path` and applies migrations.
///
/// The literal path `:memory:` opens a private in-memory database.
pub fn open_connection(path: &Path) -> DriverResult<Connection> {
    let mode = if path.as_os_str() == IN_MEMORY_PATH {
        "memory"
    } else {
        "file"
    };
    let started_at = Instant::now();
    info!("event=db_open module=driver status=start backend=sqlite3 mode={mode}");

    let result = Connection::open(path)
        .map_err(Into::into)
        .and_then(|mut conn| bootstrap_connection(&mut conn).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=driver status=ok backend=sqlite3 mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=driver status=error backend=sqlite3 mode={mode} duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn bootstrap_connection(conn: &mut Connection) -> DriverResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}
