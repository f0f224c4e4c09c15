//! The query engine seam.
//!
//! Everything above this module talks to the engine through [`QueryEngine`]:
//! list the registered tables and views, list or describe their columns, and
//! run textual SQL that comes back as a [`Frame`] of [`Datum`] cells.
//! [`SqliteEngine`] is the implementation backed by an SQLite database whose
//! views hold the datasets.

use std::collections::BTreeMap;
use std::path::Path;

// used for the engine connection and the CORR aggregate
use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OpenFlags};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

// ------------- Datum -------------
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Datum {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Integer(i) => Some(*i),
            Datum::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Datum::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Integer(i) => Some(*i as f64),
            Datum::Real(f) => Some(*f),
            Datum::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }
    /// The string form used for labels and set membership; `None` for nulls.
    pub fn to_label(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            Datum::Integer(i) => Some(i.to_string()),
            // keeps a trailing ".0" so that 1.0 and 1 stay distinguishable
            Datum::Real(f) => Some(format!("{f:?}")),
            Datum::Text(t) => Some(t.clone()),
            Datum::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<ValueRef<'_>> for Datum {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Datum::Null,
            ValueRef::Integer(i) => Datum::Integer(i),
            ValueRef::Real(f) => Datum::Real(f),
            ValueRef::Text(t) => Datum::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Datum::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Datum {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Datum::Null => ToSqlOutput::Owned(Value::Null),
            Datum::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Datum::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Datum::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Datum::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

// ------------- Frame -------------
/// Tabular result of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Datum>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Datum>>) -> Self {
        Self { columns, rows }
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn rows(&self) -> &[Vec<Datum>] {
        &self.rows
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
    /// All cells of one column, top to bottom. Empty when the column is absent.
    pub fn values(&self, column: &str) -> Vec<&Datum> {
        match self.index_of(column) {
            Some(i) => self.rows.iter().filter_map(|row| row.get(i)).collect(),
            None => Vec::new(),
        }
    }
    /// The cell of `column` in the first row.
    pub fn scalar(&self, column: &str) -> Option<&Datum> {
        let i = self.index_of(column)?;
        self.rows.first().and_then(|row| row.get(i))
    }
    /// Reads a `COUNT(*)`-style scalar, zero when absent.
    pub fn count(&self, column: &str) -> u64 {
        self.scalar(column)
            .and_then(Datum::as_i64)
            .map_or(0, |n| n.max(0) as u64)
    }
    /// Rows as JSON objects keyed by column name.
    pub fn records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, datum)| {
                        (
                            column.clone(),
                            serde_json::to_value(datum).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

/// Column name and declared type, as reported by `describe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub column_type: String,
}

/// Named statement parameters, referenced as `:name` in the SQL text.
pub type QueryParams = BTreeMap<String, Datum>;

// ------------- QueryEngine -------------
pub trait QueryEngine: Send {
    /// Names of every registered table and view.
    fn tables(&self) -> Result<Vec<String>>;
    /// Column names of a table, in declaration order. Empty for unknown tables.
    fn fields(&self, table: &str) -> Result<Vec<String>>;
    fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>>;
    fn query_with(&self, sql: &str, params: &QueryParams) -> Result<Frame>;
    fn query(&self, sql: &str) -> Result<Frame> {
        self.query_with(sql, &QueryParams::new())
    }
}

// ------------- SqliteEngine -------------
pub struct SqliteEngine {
    connection: Connection,
}

impl SqliteEngine {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(connection)
    }
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
    pub fn from_connection(connection: Connection) -> Result<Self> {
        connection.create_aggregate_function(
            "CORR",
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            Pearson,
        )?;
        Ok(Self { connection })
    }
    /// Runs statements that return no rows, such as the DDL of a fixture.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection.execute_batch(sql)?;
        Ok(())
    }
}

impl QueryEngine for SqliteEngine {
    fn tables(&self) -> Result<Vec<String>> {
        let mut statement = self.connection.prepare(
            "
            select name
                from sqlite_master
                where type in ('table', 'view')
                and name not like 'sqlite_%'
                order by name
        ",
        )?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }
    fn fields(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .describe(table)?
            .into_iter()
            .map(|column| column.column_name)
            .collect())
    }
    fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut statement = self.connection.prepare(
            "
            select name, type
                from pragma_table_info(?1)
                order by cid
        ",
        )?;
        let columns = statement
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    column_name: row.get(0)?,
                    column_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }
    fn query_with(&self, sql: &str, params: &QueryParams) -> Result<Frame> {
        debug!(%sql, params = params.len(), "issuing query");
        let mut statement = self.connection.prepare(sql)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let names: Vec<String> = params.keys().map(|name| format!(":{name}")).collect();
        let named: Vec<(&str, &dyn ToSql)> = names
            .iter()
            .zip(params.values())
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();
        let mut rows = statement.query(named.as_slice())?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                record.push(Datum::from(row.get_ref(i)?));
            }
            records.push(record);
        }
        Ok(Frame::new(columns, records))
    }
}

// ------------- CORR aggregate -------------
// Pearson correlation coefficient of (x, y) pairs. Rows where either side is
// null or not numeric are ignored; fewer than two pairs or a constant side
// yields null.
struct Pearson;

#[derive(Default)]
struct Moments {
    n: f64,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
}

fn numeric(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) if !f.is_nan() => Some(f),
        _ => None,
    }
}

impl Aggregate<Moments, Option<f64>> for Pearson {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<Moments> {
        Ok(Moments::default())
    }
    fn step(&self, ctx: &mut Context<'_>, acc: &mut Moments) -> rusqlite::Result<()> {
        if let (Some(x), Some(y)) = (numeric(ctx.get_raw(0)), numeric(ctx.get_raw(1))) {
            acc.n += 1.0;
            acc.sum_x += x;
            acc.sum_y += y;
            acc.sum_xx += x * x;
            acc.sum_yy += y * y;
            acc.sum_xy += x * y;
        }
        Ok(())
    }
    fn finalize(&self, _: &mut Context<'_>, acc: Option<Moments>) -> rusqlite::Result<Option<f64>> {
        let Some(m) = acc else { return Ok(None) };
        if m.n < 2.0 {
            return Ok(None);
        }
        let covariance = m.sum_xy - m.sum_x * m.sum_y / m.n;
        let variance_x = m.sum_xx - m.sum_x * m.sum_x / m.n;
        let variance_y = m.sum_yy - m.sum_y * m.sum_y / m.n;
        if variance_x <= 0.0 || variance_y <= 0.0 {
            return Ok(None);
        }
        let r = covariance / (variance_x.sqrt() * variance_y.sqrt());
        Ok(Some(r.clamp(-1.0, 1.0)))
    }
}
