// src/store/mysql.rs
use anyhow::{Context, Result};
use mysql::{prelude::Queryable, Conn, OptsBuilder, Params, TxOpts, Value as MyValue};
use tracing::debug;

use super::{column_defs, quote_ident, TableStore};
use crate::{
    config::DbConfig,
    table::{ColumnType, RowSet, Value},
};

/// MySQL / MariaDB destination over a single explicit connection.
/// The connection closes when the store is dropped.
pub struct MySqlStore {
    conn: Conn,
}

impl MySqlStore {
    pub fn connect(cfg: &DbConfig) -> Result<Self> {
        let password = (!cfg.password.is_empty()).then(|| cfg.password.clone());
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(cfg.host.clone()))
            .tcp_port(cfg.port)
            .user(Some(cfg.user.clone()))
            .pass(password)
            .db_name(Some(cfg.name.clone()));
        let conn = Conn::new(opts)?;
        debug!(url = %cfg.redacted_url(), "mysql connection open");
        Ok(Self { conn })
    }
}

pub(crate) fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Text => "TEXT",
    }
}

pub(crate) fn create_table_sql(name: &str, rows: &RowSet) -> String {
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(name, '`'),
        column_defs(&rows.columns, '`', sql_type)
    )
}

pub(crate) fn insert_sql(name: &str, rows: &RowSet) -> String {
    let cols = rows
        .column_names()
        .map(|c| quote_ident(c, '`'))
        .collect::<Vec<_>>()
        .join(", ");
    let marks = vec!["?"; rows.num_columns()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(name, '`'),
        cols,
        marks
    )
}

fn to_mysql(v: &Value) -> MyValue {
    match v {
        Value::Null => MyValue::NULL,
        Value::Int(i) => MyValue::Int(*i),
        // DOUBLE columns cannot hold NaN/inf
        Value::Float(f) if !f.is_finite() => MyValue::NULL,
        Value::Float(f) => MyValue::Double(*f),
        Value::Bool(b) => MyValue::Int(i64::from(*b)),
        Value::Text(s) => MyValue::Bytes(s.as_bytes().to_vec()),
    }
}

impl TableStore for MySqlStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    fn ping(&mut self) -> Result<()> {
        self.conn.query_drop("SELECT 1").context("SELECT 1")?;
        Ok(())
    }

    fn replace_table(&mut self, name: &str, rows: &RowSet) -> Result<u64> {
        let quoted = quote_ident(name, '`');
        // DDL commits implicitly in MySQL, so only the inserts share a transaction
        self.conn
            .query_drop(format!("DROP TABLE IF EXISTS {}", quoted))
            .with_context(|| format!("dropping {}", name))?;
        self.conn
            .query_drop(create_table_sql(name, rows))
            .with_context(|| format!("creating {}", name))?;

        if rows.rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.conn.start_transaction(TxOpts::default())?;
        let stmt = tx.prep(insert_sql(name, rows))?;
        tx.exec_batch(
            &stmt,
            rows.rows
                .iter()
                .map(|row| Params::Positional(row.iter().map(to_mysql).collect())),
        )
        .with_context(|| format!("inserting rows into {}", name))?;
        tx.commit()?;

        Ok(rows.num_rows() as u64)
    }

    fn table_exists(&mut self, name: &str) -> Result<bool> {
        let n: Option<u64> = self.conn.exec_first(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
            (name,),
        )?;
        Ok(n.unwrap_or(0) > 0)
    }

    fn row_count(&mut self, name: &str) -> Result<u64> {
        let n: Option<u64> = self
            .conn
            .query_first(format!("SELECT COUNT(*) FROM {}", quote_ident(name, '`')))?;
        Ok(n.unwrap_or(0))
    }

    fn column_names(&mut self, name: &str) -> Result<Vec<String>> {
        let names: Vec<String> = self.conn.exec(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
            (name,),
        )?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_csv;
    use std::io::Cursor;

    fn games() -> RowSet {
        parse_csv(Cursor::new(&b"id,pts,team,home\n1,100.5,LAL,true\n"[..])).unwrap()
    }

    #[test]
    fn create_statement_maps_types() {
        assert_eq!(
            create_table_sql("games_2023", &games()),
            "CREATE TABLE `games_2023` (`id` BIGINT, `pts` DOUBLE, `team` TEXT, `home` BOOLEAN)"
        );
    }

    #[test]
    fn insert_statement_has_one_marker_per_column() {
        assert_eq!(
            insert_sql("games_2023", &games()),
            "INSERT INTO `games_2023` (`id`, `pts`, `team`, `home`) VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn values_map_to_wire_types() {
        assert_eq!(to_mysql(&Value::Null), MyValue::NULL);
        assert_eq!(to_mysql(&Value::Bool(true)), MyValue::Int(1));
        assert_eq!(to_mysql(&Value::Float(f64::INFINITY)), MyValue::NULL);
        assert_eq!(
            to_mysql(&Value::Text("LAL".into())),
            MyValue::Bytes(b"LAL".to_vec())
        );
    }
}
