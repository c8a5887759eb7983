use async_trait::async_trait;
use ponygen_config::Provider;
use sqlx::{MySqlPool, Row};

use super::{IndexColumn, KeyColumn, MetadataReader, group_index_columns, group_key_columns};
use crate::schema::{Column, ForeignKey, Index, NativeType};

/// Column types whose `information_schema` defaults come back without quotes.
const QUOTED_DEFAULT_TYPES: &[&str] = &[
    "char", "varchar", "tinytext", "text", "mediumtext", "longtext", "enum", "set", "date", "datetime",
    "timestamp", "time", "year", "binary", "varbinary",
];

/// Reads `information_schema` for the current `DATABASE()`.
///
/// Every text column is `CAST(... AS CHAR)` because MySQL 8 reports catalog
/// columns as binary strings over the wire.
pub struct MySqlReader {
    pool: MySqlPool,
}

impl MySqlReader {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataReader for MySqlReader {
    fn provider(&self) -> Provider {
        Provider::MySql
    }

    async fn list_tables(&self) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(table_name AS CHAR) AS table_name
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
                AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("table_name")).collect()
    }

    async fn list_columns(&self, table: &str) -> sqlx::Result<Vec<Column>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(column_name AS CHAR) AS column_name,
                CAST(data_type AS CHAR) AS data_type,
                CAST(column_type AS CHAR) AS column_type,
                CAST(is_nullable AS CHAR) AS is_nullable,
                CAST(column_default AS CHAR) AS column_default,
                CAST(extra AS CHAR) AS extra,
                CAST(ordinal_position AS SIGNED) AS ordinal_position
            FROM information_schema.columns
            WHERE table_schema = DATABASE()
                AND table_name = ?
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let data_type: String = row.try_get("data_type")?;
            let column_type: String = row.try_get("column_type")?;
            let extra: String = row.try_get::<Option<String>, _>("extra")?.unwrap_or_default();
            let ordinal: i64 = row.try_get("ordinal_position")?;
            let auto_increment = extra.to_ascii_lowercase().contains("auto_increment");

            columns.push(Column {
                name: row.try_get("column_name")?,
                native_type: NativeType::parse_declared(&column_type),
                is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                default: sql_default(row.try_get("column_default")?, &data_type, &extra),
                ordinal: u32::try_from(ordinal).unwrap_or(u32::MAX),
                auto_increment,
            });
        }
        Ok(columns)
    }

    async fn list_primary_key(&self, table: &str) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(column_name AS CHAR) AS column_name
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
                AND table_name = ?
                AND constraint_name = 'PRIMARY'
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("column_name")).collect()
    }

    async fn list_foreign_keys(&self, table: &str) -> sqlx::Result<Vec<ForeignKey>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(constraint_name AS CHAR) AS constraint_name,
                CAST(ordinal_position AS SIGNED) AS position,
                CAST(column_name AS CHAR) AS column_name,
                CAST(referenced_table_name AS CHAR) AS referenced_table,
                CAST(referenced_column_name AS CHAR) AS referenced_column
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
                AND table_name = ?
                AND referenced_table_name IS NOT NULL
                AND referenced_table_schema = DATABASE()
            ORDER BY constraint_name, ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("constraint_name")?;
            parts.push(KeyColumn {
                key: name.clone(),
                name: Some(name),
                position: row.try_get("position")?,
                column: row.try_get("column_name")?,
                referenced_table: row.try_get("referenced_table")?,
                referenced_column: row.try_get("referenced_column")?,
            });
        }
        Ok(group_key_columns(parts))
    }

    async fn list_indexes(&self, table: &str) -> sqlx::Result<Vec<Index>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(index_name AS CHAR) AS index_name,
                CAST(seq_in_index AS SIGNED) AS position,
                CAST(column_name AS CHAR) AS column_name,
                CAST(non_unique AS SIGNED) AS non_unique,
                CAST(index_type AS CHAR) AS index_type
            FROM information_schema.statistics
            WHERE table_schema = DATABASE()
                AND table_name = ?
                AND index_name <> 'PRIMARY'
            ORDER BY index_name, seq_in_index
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::with_capacity(rows.len());
        for row in rows {
            parts.push(IndexColumn {
                index: row.try_get("index_name")?,
                position: row.try_get("position")?,
                column: row.try_get("column_name")?,
                is_unique: row.try_get::<i64, _>("non_unique")? == 0,
                index_type: row.try_get::<String, _>("index_type")?.to_ascii_lowercase(),
            });
        }
        Ok(group_index_columns(parts))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Turns a catalog default back into SQL: literals of text and temporal types
/// are quoted, expressions and numbers are kept as they are.
fn sql_default(default: Option<String>, data_type: &str, extra: &str) -> Option<String> {
    let value = default?;
    let lowered = value.to_ascii_lowercase();
    if lowered == "null" {
        return None;
    }
    if value.starts_with('\'')
        || extra.to_ascii_uppercase().contains("DEFAULT_GENERATED")
        || lowered.starts_with("current_timestamp")
        || !QUOTED_DEFAULT_TYPES.contains(&data_type.to_ascii_lowercase().as_str())
    {
        return Some(value);
    }
    Some(format!("'{}'", value.replace('\'', "''")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_literal_defaults() {
        assert_eq!(sql_default(Some("draft".into()), "varchar", ""), Some("'draft'".into()));
        assert_eq!(sql_default(Some("it's".into()), "text", ""), Some("'it''s'".into()));
        assert_eq!(sql_default(Some("2020-01-01".into()), "date", ""), Some("'2020-01-01'".into()));
    }

    #[test]
    fn keeps_numbers_and_expressions() {
        assert_eq!(sql_default(Some("0".into()), "int", ""), Some("0".into()));
        assert_eq!(
            sql_default(Some("CURRENT_TIMESTAMP".into()), "timestamp", "DEFAULT_GENERATED"),
            Some("CURRENT_TIMESTAMP".into())
        );
        assert_eq!(
            sql_default(Some("current_timestamp()".into()), "datetime", ""),
            Some("current_timestamp()".into())
        );
        assert_eq!(sql_default(Some("'quoted'".into()), "varchar", ""), Some("'quoted'".into()));
        assert_eq!(sql_default(Some("NULL".into()), "varchar", ""), None);
        assert_eq!(sql_default(None, "varchar", ""), None);
    }
}
