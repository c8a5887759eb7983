use async_trait::async_trait;
use ponygen_config::Provider;
use sqlx::{Row, SqlitePool};

use super::{IndexColumn, KeyColumn, MetadataReader, group_index_columns, group_key_columns};
use crate::schema::{Column, ForeignKey, Index, NativeType};

/// Reads `sqlite_master` and the table-valued `pragma_*` functions.
pub struct SqliteReader {
    pool: SqlitePool,
}

impl SqliteReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataReader for SqliteReader {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    async fn list_tables(&self) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
                AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("name")).collect()
    }

    async fn list_columns(&self, table: &str) -> sqlx::Result<Vec<Column>> {
        let rows = sqlx::query(
            r#"
            SELECT cid, name, type, "notnull", dflt_value, pk
            FROM pragma_table_info(?1)
            ORDER BY cid
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let key_count = rows
            .iter()
            .filter(|row| row.try_get::<i64, _>("pk").is_ok_and(|pk| pk > 0))
            .count();

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let cid: i64 = row.try_get("cid")?;
            let declared: String = row.try_get::<Option<String>, _>("type")?.unwrap_or_default();
            let not_null: i64 = row.try_get("notnull")?;
            let is_key = row.try_get::<i64, _>("pk")? > 0;

            // A lone INTEGER PRIMARY KEY aliases the rowid.
            let auto_increment = is_key && key_count == 1 && declared.trim().eq_ignore_ascii_case("integer");

            columns.push(Column {
                name: row.try_get("name")?,
                native_type: NativeType::parse_declared(&declared),
                is_nullable: not_null == 0 && !is_key,
                default: row.try_get("dflt_value")?,
                ordinal: u32::try_from(cid + 1).unwrap_or(u32::MAX),
                auto_increment,
            });
        }
        Ok(columns)
    }

    async fn list_primary_key(&self, table: &str) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT name
            FROM pragma_table_info(?1)
            WHERE pk > 0
            ORDER BY pk
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("name")).collect()
    }

    async fn list_foreign_keys(&self, table: &str) -> sqlx::Result<Vec<ForeignKey>> {
        let rows = sqlx::query(
            r#"
            SELECT id, seq, "table", "from", "to"
            FROM pragma_foreign_key_list(?1)
            ORDER BY id, seq
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let seq: i64 = row.try_get("seq")?;
            let referenced_table: String = row.try_get("table")?;
            let referenced_column = match row.try_get::<Option<String>, _>("to")? {
                Some(column) => column,
                // `REFERENCES parent` without columns targets the parent's primary key.
                None => {
                    let key = self.list_primary_key(&referenced_table).await?;
                    usize::try_from(seq)
                        .ok()
                        .and_then(|i| key.get(i).cloned())
                        .unwrap_or_default()
                }
            };
            parts.push(KeyColumn {
                key: format!("{:08}", id),
                name: None,
                position: seq,
                column: row.try_get("from")?,
                referenced_table,
                referenced_column,
            });
        }
        Ok(group_key_columns(parts))
    }

    async fn list_indexes(&self, table: &str) -> sqlx::Result<Vec<Index>> {
        let indexes = sqlx::query(
            r#"
            SELECT name, "unique", origin
            FROM pragma_index_list(?1)
            WHERE origin <> 'pk'
            ORDER BY name
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::new();
        for index in indexes {
            let name: String = index.try_get("name")?;
            let is_unique = index.try_get::<i64, _>("unique")? != 0;

            let columns = sqlx::query(
                r#"
                SELECT seqno, name
                FROM pragma_index_info(?1)
                ORDER BY seqno
                "#,
            )
            .bind(name.as_str())
            .fetch_all(&self.pool)
            .await?;

            for column in columns {
                parts.push(IndexColumn {
                    index: name.clone(),
                    position: column.try_get("seqno")?,
                    column: column.try_get("name")?,
                    is_unique,
                    index_type: "btree".to_string(),
                });
            }
        }
        Ok(group_index_columns(parts))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
