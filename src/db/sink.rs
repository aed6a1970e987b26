// Bulk-loader sink
// The pipeline writes through BulkSink only. SqliteSink commits once per call.

use std::collections::{HashMap, HashSet};
use rusqlite::{params_from_iter, Connection};
use rusqlite::types::Value;

use crate::db::tables::Table;
use crate::error::{NormalizeError, Result};

/// One tuple in the table's declared column order.
pub type Row = Vec<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Skip rows that hit the table's declared uniqueness constraint.
    IgnoreConflicts,
    /// Insert every row. Only the append-only ratings stream uses this.
    Plain,
}

pub trait BulkSink {
    /// Insert `rows` into `table` and commit. Returns how many rows were stored.
    fn bulk_insert(&mut self, table: Table, mode: InsertMode, rows: &[Row]) -> Result<usize>;

    /// Every stored id of a table keyed by its own natural id.
    fn fetch_ids(&mut self, table: Table) -> Result<HashSet<i64>>;

    /// natural key -> stored id for a surrogate-keyed lookup table.
    fn fetch_key_map(&mut self, table: Table) -> Result<HashMap<String, i64>>;

    fn count_rows(&mut self, table: Table) -> Result<i64>;
}

pub struct SqliteSink<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSink<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl BulkSink for SqliteSink<'_> {
    fn bulk_insert(&mut self, table: Table, mode: InsertMode, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let width = table.schema().columns.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(NormalizeError::Other(format!(
                "{} expects {} columns, got a row with {}",
                table,
                width,
                bad.len()
            )));
        }

        let sql = table.insert_sql(mode == InsertMode::IgnoreConflicts);
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                inserted += stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        log::debug!("{}: stored {} of {} rows", table, inserted, rows.len());
        Ok(inserted)
    }

    fn fetch_ids(&mut self, table: Table) -> Result<HashSet<i64>> {
        let schema = table.schema();
        let id_column = schema
            .id_column
            .ok_or_else(|| NormalizeError::Other(format!("{} has no id column", table)))?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM {}", id_column, schema.name))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<HashSet<i64>>>()?;
        Ok(ids)
    }

    fn fetch_key_map(&mut self, table: Table) -> Result<HashMap<String, i64>> {
        let schema = table.schema();
        let (key_column, id_column) = match (schema.key_column, schema.id_column) {
            (Some(k), Some(i)) => (k, i),
            _ => {
                return Err(NormalizeError::Other(format!(
                    "{} is not a surrogate-keyed lookup",
                    table
                )))
            }
        };

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, {} FROM {}",
            key_column, id_column, schema.name
        ))?;
        let map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, i64>>>()?;
        Ok(map)
    }

    fn count_rows(&mut self, table: Table) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn test_ignore_conflicts_reports_stored_rows_only() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);

        let rows: Vec<Row> = vec![
            vec![Value::Integer(18), Value::Text("Drama".into())],
            vec![Value::Integer(18), Value::Text("drama".into())],
            vec![Value::Integer(35), Value::Text("Comedy".into())],
        ];
        let stored = sink.bulk_insert(Table::Genres, InsertMode::IgnoreConflicts, &rows).unwrap();

        assert_eq!(stored, 2);
        assert_eq!(sink.count_rows(Table::Genres).unwrap(), 2);
    }

    #[test]
    fn test_plain_insert_fails_on_conflict() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let rows: Vec<Row> = vec![vec![Value::Integer(1)], vec![Value::Integer(1)]];

        assert!(sink.bulk_insert(Table::Users, InsertMode::Plain, &rows).is_err());
        // The failed call rolled back as a whole
        assert_eq!(sink.count_rows(Table::Users).unwrap(), 0);
    }

    #[test]
    fn test_row_width_is_checked() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let rows: Vec<Row> = vec![vec![Value::Integer(18)]];

        assert!(sink.bulk_insert(Table::Genres, InsertMode::IgnoreConflicts, &rows).is_err());
    }

    #[test]
    fn test_key_map_reads_surrogate_ids() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let rows: Vec<Row> = vec![
            vec![Value::Text("US".into()), Value::Text("United States of America".into())],
            vec![Value::Text("FR".into()), Value::Text("France".into())],
        ];
        sink.bulk_insert(Table::ProductionCountries, InsertMode::IgnoreConflicts, &rows).unwrap();

        let map = sink.fetch_key_map(Table::ProductionCountries).unwrap();
        assert_eq!(map.len(), 2);
        assert_ne!(map["US"], map["FR"]);

        assert!(sink.fetch_key_map(Table::Genres).is_err());
    }
}
