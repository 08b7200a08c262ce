// src/store/mod.rs
use anyhow::{Context, Result};

use crate::{
    config::Destination,
    error::LoadError,
    table::{Column, ColumnType, RowSet},
};

pub mod duck;
pub mod mysql;

pub use duck::DuckStore;
pub use mysql::MySqlStore;

/// A relational store the loader writes whole tables into.
pub trait TableStore {
    /// Short backend label for log lines.
    fn backend(&self) -> &'static str;

    /// Round-trip a trivial query to prove the connection works.
    fn ping(&mut self) -> Result<()>;

    /// Drop `name` if present, recreate it from `rows.columns`, insert every row.
    /// Returns the number of rows written.
    fn replace_table(&mut self, name: &str, rows: &RowSet) -> Result<u64>;

    fn table_exists(&mut self, name: &str) -> Result<bool>;

    fn row_count(&mut self, name: &str) -> Result<u64>;

    /// Column names of `name` in table order.
    fn column_names(&mut self, name: &str) -> Result<Vec<String>>;
}

/// Open the store named by `dest`. Failures map to [`LoadError::Connection`].
pub fn open(dest: &Destination) -> Result<Box<dyn TableStore>, LoadError> {
    let store: Box<dyn TableStore> = match dest {
        Destination::MySql(cfg) => Box::new(
            MySqlStore::connect(cfg)
                .with_context(|| format!("connecting to {}", cfg.redacted_url()))
                .map_err(LoadError::Connection)?,
        ),
        Destination::DuckDb(path) => Box::new(
            DuckStore::open(path.as_deref())
                .context("opening duckdb database")
                .map_err(LoadError::Connection)?,
        ),
    };
    Ok(store)
}

/// Quote an identifier with `quote`, doubling any embedded quote character.
pub(crate) fn quote_ident(name: &str, quote: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for ch in name.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
    out
}

/// Column list for a CREATE TABLE statement: `"a" BIGINT, "b" TEXT`.
pub(crate) fn column_defs(
    columns: &[Column],
    quote: char,
    sql_type: impl Fn(ColumnType) -> &'static str,
) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name, quote), sql_type(c.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_quote_chars() {
        assert_eq!(quote_ident("games_2023", '`'), "`games_2023`");
        assert_eq!(quote_ident("we`ird", '`'), "`we``ird`");
        assert_eq!(quote_ident("say \"hi\"", '"'), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn column_defs_use_backend_types() {
        let cols = vec![
            Column {
                name: "id".into(),
                ty: ColumnType::Integer,
            },
            Column {
                name: "team name".into(),
                ty: ColumnType::Text,
            },
        ];
        let defs = column_defs(&cols, '"', |t| match t {
            ColumnType::Integer => "BIGINT",
            _ => "VARCHAR",
        });
        assert_eq!(defs, "\"id\" BIGINT, \"team name\" VARCHAR");
    }
}
