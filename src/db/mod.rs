// Database module

pub mod migrations;
pub mod sink;
pub mod tables;

use rusqlite::Connection;
use std::path::Path;
use anyhow::Result;

use sink::{BulkSink, SqliteSink};
use tables::Table;

/// Open or create a database at the given path
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// In-memory database with the schema applied
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // Enable foreign keys (must be done per connection)
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    Ok(())
}

/// Row count for every table, in schema order
pub fn table_counts(conn: &Connection) -> Result<Vec<(Table, i64)>> {
    let mut sink = SqliteSink::new(conn);
    let mut counts = Vec::with_capacity(Table::ALL.len());
    for table in Table::ALL {
        counts.push((table, sink.count_rows(table)?));
    }
    Ok(counts)
}
