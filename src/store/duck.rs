// src/store/duck.rs
use anyhow::{Context, Result};
use duckdb::{params, types::Value as DuckValue, Connection, ToSql};
use std::path::Path;
use tracing::debug;

use super::{column_defs, quote_ident, TableStore};
use crate::table::{ColumnType, RowSet, Value};

/// DuckDB destination, on disk or in memory.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open a DuckDB database at `path`, creating the file if it doesn't exist;
    /// `None` opens an in-memory database.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .with_context(|| format!("opening duckdb file {}", p.display()))?,
            None => Connection::open_in_memory()?,
        };
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub(crate) fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Text => "VARCHAR",
    }
}

fn to_duck(v: &Value) -> DuckValue {
    match v {
        Value::Null => DuckValue::Null,
        Value::Int(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Text(s) => DuckValue::Text(s.clone()),
    }
}

impl TableStore for DuckStore {
    fn backend(&self) -> &'static str {
        "duckdb"
    }

    fn ping(&mut self) -> Result<()> {
        let one: i32 = self.conn.query_row("SELECT 1", [], |r| r.get(0))?;
        debug!(one, "duckdb ping");
        Ok(())
    }

    fn replace_table(&mut self, name: &str, rows: &RowSet) -> Result<u64> {
        let ddl = format!(
            "CREATE OR REPLACE TABLE {} ({});",
            quote_ident(name, '"'),
            column_defs(&rows.columns, '"', sql_type)
        );

        // table swap and rows land together or not at all
        let tx = self.conn.transaction()?;
        tx.execute_batch(&ddl)
            .with_context(|| format!("creating table {}", name))?;
        {
            let mut appender = tx.appender(name)?;
            for row in &rows.rows {
                let values: Vec<DuckValue> = row.iter().map(to_duck).collect();
                let refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                appender.append_row(refs.as_slice())?;
            }
            appender.flush()?;
        }
        tx.commit()
            .with_context(|| format!("committing table {}", name))?;

        Ok(rows.num_rows() as u64)
    }

    fn table_exists(&mut self, name: &str) -> Result<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![name],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    fn row_count(&mut self, name: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name, '"'));
        let n: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n as u64)
    }

    fn column_names(&mut self, name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;
        let names = stmt
            .query_map(params![name], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}
