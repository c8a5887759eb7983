use async_trait::async_trait;
use ponygen_config::Provider;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::schema::{Column, ForeignKey, Index, Schema, Table};

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlReader;
pub use postgres::PostgresReader;
pub use sqlite::SqliteReader;

/// Read-only access to one engine's catalog, already normalised into the schema types.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    fn provider(&self) -> Provider;

    /// Base tables, sorted by name. Views are not listed.
    async fn list_tables(&self) -> sqlx::Result<Vec<String>>;

    async fn list_columns(&self, table: &str) -> sqlx::Result<Vec<Column>>;

    /// Primary-key columns in key order.
    async fn list_primary_key(&self, table: &str) -> sqlx::Result<Vec<String>>;

    async fn list_foreign_keys(&self, table: &str) -> sqlx::Result<Vec<ForeignKey>>;

    /// Secondary indexes; the primary key's own index is left out.
    async fn list_indexes(&self, table: &str) -> sqlx::Result<Vec<Index>>;

    async fn close(&self);
}

/// The supported engines, selected by [`Provider`].
pub enum Reader {
    Sqlite(SqliteReader),
    MySql(MySqlReader),
    Postgres(PostgresReader),
}

macro_rules! delegate {
    ($self:ident, $reader:ident => $call:expr) => {
        match $self {
            Reader::Sqlite($reader) => $call,
            Reader::MySql($reader) => $call,
            Reader::Postgres($reader) => $call,
        }
    };
}

#[async_trait]
impl MetadataReader for Reader {
    fn provider(&self) -> Provider {
        delegate!(self, reader => reader.provider())
    }

    async fn list_tables(&self) -> sqlx::Result<Vec<String>> {
        delegate!(self, reader => reader.list_tables().await)
    }

    async fn list_columns(&self, table: &str) -> sqlx::Result<Vec<Column>> {
        delegate!(self, reader => reader.list_columns(table).await)
    }

    async fn list_primary_key(&self, table: &str) -> sqlx::Result<Vec<String>> {
        delegate!(self, reader => reader.list_primary_key(table).await)
    }

    async fn list_foreign_keys(&self, table: &str) -> sqlx::Result<Vec<ForeignKey>> {
        delegate!(self, reader => reader.list_foreign_keys(table).await)
    }

    async fn list_indexes(&self, table: &str) -> sqlx::Result<Vec<Index>> {
        delegate!(self, reader => reader.list_indexes(table).await)
    }

    async fn close(&self) {
        delegate!(self, reader => reader.close().await)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Tables to leave out entirely.
    pub exclude: BTreeSet<String>,
}

impl ReadOptions {
    pub fn excluding<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReadOptions {
            exclude: tables.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaRead {
    pub schema: Schema,
    pub diagnostics: Diagnostics,
}

/// Reads every table into one [`Schema`]. Only transport failures abort;
/// a table whose catalog entries cannot be read is skipped with a diagnostic.
pub async fn read_schema<R>(reader: &R, options: &ReadOptions) -> Result<SchemaRead>
where
    R: MetadataReader + ?Sized,
{
    let mut diagnostics = Diagnostics::default();
    let mut names = reader.list_tables().await.map_err(|e| {
        if is_connection_failure(&e) {
            Error::Connection(e)
        } else {
            Error::Catalog(e)
        }
    })?;
    names.sort();
    names.dedup();
    info!("Reading {} tables from {} catalog", names.len(), reader.provider());

    let mut tables = Vec::new();
    let mut unread = BTreeSet::new();
    for name in names {
        if options.exclude.contains(&name) {
            debug!("`{}` excluded", name);
            unread.insert(name);
            continue;
        }
        match read_table(reader, &name).await {
            Ok(Some(table)) => tables.push(table),
            Ok(None) => {
                diagnostics.push(Diagnostic::SkippedTable {
                    table: name.clone(),
                    reason: "no columns".to_string(),
                });
                unread.insert(name);
            }
            Err(e) if is_connection_failure(&e) => return Err(Error::Connection(e)),
            Err(e) => {
                diagnostics.push(Diagnostic::SkippedTable {
                    table: name.clone(),
                    reason: e.to_string(),
                });
                unread.insert(name);
            }
        }
    }

    for table in &mut tables {
        let name = table.name.clone();
        table.foreign_keys.retain(|fk| {
            if !unread.contains(&fk.referenced_table) {
                return true;
            }
            diagnostics.push(Diagnostic::UnsupportedSchemaFeature {
                table: name.clone(),
                detail: format!(
                    "foreign key ({}) -> `{}` dropped because the referenced table was not read",
                    fk.columns.join(", "),
                    fk.referenced_table
                ),
            });
            false
        });
    }

    Ok(SchemaRead {
        schema: Schema::from_tables(tables),
        diagnostics,
    })
}

async fn read_table<R>(reader: &R, name: &str) -> sqlx::Result<Option<Table>>
where
    R: MetadataReader + ?Sized,
{
    let mut columns = reader.list_columns(name).await?;
    if columns.is_empty() {
        return Ok(None);
    }
    columns.sort_by_key(|c| c.ordinal);

    let primary_key = reader.list_primary_key(name).await?;

    let mut foreign_keys = reader.list_foreign_keys(name).await?;
    let position = |fk: &ForeignKey| {
        fk.columns
            .first()
            .and_then(|first| columns.iter().find(|c| &c.name == first))
            .map_or(u32::MAX, |c| c.ordinal)
    };
    foreign_keys.sort_by_key(|fk| position(fk));

    let mut indexes = reader.list_indexes(name).await?;
    indexes.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(
        "`{}`: {} columns, {} foreign keys, {} indexes",
        name,
        columns.len(),
        foreign_keys.len(),
        indexes.len()
    );

    Ok(Some(Table {
        name: name.to_string(),
        columns,
        primary_key,
        foreign_keys,
        indexes,
    }))
}

/// Errors meaning the database itself is unreachable, as opposed to one catalog query failing.
pub(crate) fn is_connection_failure(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_)
    )
}

// ============ Row grouping ============

/// One column of a foreign key, as catalogs return them.
pub(crate) struct KeyColumn {
    pub key: String,
    pub name: Option<String>,
    pub position: i64,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

pub(crate) fn group_key_columns(rows: Vec<KeyColumn>) -> Vec<ForeignKey> {
    let mut grouped: BTreeMap<String, Vec<KeyColumn>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.key.clone()).or_default().push(row);
    }

    grouped
        .into_values()
        .filter_map(|mut parts| {
            parts.sort_by_key(|p| p.position);
            let first = parts.first()?;
            Some(ForeignKey {
                name: first.name.clone(),
                columns: parts.iter().map(|p| p.column.clone()).collect(),
                referenced_table: first.referenced_table.clone(),
                referenced_columns: parts.iter().map(|p| p.referenced_column.clone()).collect(),
            })
        })
        .collect()
}

/// One column of an index. `column` is `None` for expression parts.
pub(crate) struct IndexColumn {
    pub index: String,
    pub position: i64,
    pub column: Option<String>,
    pub is_unique: bool,
    pub index_type: String,
}

/// Groups index rows; expression indexes are dropped since no attribute can stand for them.
pub(crate) fn group_index_columns(rows: Vec<IndexColumn>) -> Vec<Index> {
    let mut grouped: BTreeMap<String, Vec<IndexColumn>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.index.clone()).or_default().push(row);
    }

    grouped
        .into_iter()
        .filter_map(|(name, mut parts)| {
            parts.sort_by_key(|p| p.position);
            let columns: Option<Vec<String>> = parts.iter().map(|p| p.column.clone()).collect();
            let first = parts.first()?;
            Some(Index {
                name,
                columns: columns?,
                is_unique: first.is_unique,
                index_type: first.index_type.clone(),
            })
        })
        .collect()
}
