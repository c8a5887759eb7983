use async_trait::async_trait;
use ponygen_config::Provider;
use sqlx::{PgPool, Row};

use super::{IndexColumn, KeyColumn, MetadataReader, group_index_columns, group_key_columns};
use crate::schema::{Column, ForeignKey, Index, NativeType};

const DEFAULT_SCHEMA: &str = "public";

/// Reads `information_schema` and `pg_catalog` for one namespace.
pub struct PostgresReader {
    pool: PgPool,
    schema: String,
}

impl PostgresReader {
    pub fn new(pool: PgPool, schema: Option<String>) -> Self {
        Self {
            pool,
            schema: schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
        }
    }

}

#[async_trait]
impl MetadataReader for PostgresReader {
    fn provider(&self) -> Provider {
        Provider::Postgres
    }

    async fn list_tables(&self) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = $1
                AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(self.schema.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("table_name")).collect()
    }

    async fn list_columns(&self, table: &str) -> sqlx::Result<Vec<Column>> {
        let rows = sqlx::query(
            r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                udt_name::text AS udt_name,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default,
                is_identity::text AS is_identity,
                character_maximum_length::int8 AS max_length,
                numeric_precision::int8 AS numeric_precision,
                numeric_scale::int8 AS numeric_scale,
                datetime_precision::int8 AS datetime_precision,
                ordinal_position::int8 AS ordinal_position,
                ARRAY(
                    SELECT e.enumlabel::text
                    FROM pg_catalog.pg_type t
                    JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
                    JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid
                    WHERE t.typname = c.udt_name
                        AND n.nspname = c.udt_schema
                        AND t.typtype = 'e'
                    ORDER BY e.enumsortorder
                ) AS enum_labels
            FROM information_schema.columns c
            WHERE c.table_schema = $1
                AND c.table_name = $2
            ORDER BY c.ordinal_position
            "#,
        )
        .bind(self.schema.as_str())
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let data_type: String = row.try_get("data_type")?;
            let udt_name: String = row.try_get("udt_name")?;
            let default: Option<String> = row.try_get("column_default")?;
            let is_identity = row.try_get::<Option<String>, _>("is_identity")?.as_deref() == Some("YES");
            let ordinal: i64 = row.try_get("ordinal_position")?;

            let native_type = native_type(
                &data_type,
                &udt_name,
                to_u32(row.try_get("max_length")?),
                to_u32(row.try_get("numeric_precision")?),
                to_u32(row.try_get("numeric_scale")?),
                to_u32(row.try_get("datetime_precision")?),
                row.try_get("enum_labels")?,
            );

            let serial = default.as_deref().is_some_and(|d| d.starts_with("nextval("));
            let auto_increment = is_identity || serial;

            columns.push(Column {
                name: row.try_get("column_name")?,
                native_type,
                is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                default: if auto_increment { None } else { default },
                ordinal: u32::try_from(ordinal).unwrap_or(u32::MAX),
                auto_increment,
            });
        }
        Ok(columns)
    }

    async fn list_primary_key(&self, table: &str) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT kcu.column_name::text AS column_name
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON kcu.constraint_name = tc.constraint_name
                AND kcu.table_schema = tc.table_schema
                AND kcu.table_name = tc.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = $1
                AND tc.table_name = $2
            ORDER BY kcu.ordinal_position
            "#,
        )
        .bind(self.schema.as_str())
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("column_name")).collect()
    }

    async fn list_foreign_keys(&self, table: &str) -> sqlx::Result<Vec<ForeignKey>> {
        // conkey/confkey keep the declared column pairing, which the
        // information_schema views lose for multi-column keys.
        let rows = sqlx::query(
            r#"
            SELECT
                con.conname::text AS constraint_name,
                k.ord::int8 AS position,
                src.attname::text AS column_name,
                ref_class.relname::text AS referenced_table,
                ref.attname::text AS referenced_column
            FROM pg_constraint AS con
            JOIN pg_class AS cls ON cls.oid = con.conrelid
            JOIN pg_namespace AS ns ON ns.oid = cls.relnamespace
            JOIN pg_class AS ref_class ON ref_class.oid = con.confrelid
            JOIN pg_namespace AS ref_ns ON ref_ns.oid = ref_class.relnamespace
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, ref_attnum, ord)
            JOIN pg_attribute AS src ON src.attrelid = con.conrelid AND src.attnum = k.src_attnum
            JOIN pg_attribute AS ref ON ref.attrelid = con.confrelid AND ref.attnum = k.ref_attnum
            WHERE con.contype = 'f'
                AND ns.nspname = $1
                AND cls.relname = $2
                AND ref_ns.nspname = $1
            ORDER BY con.conname, k.ord
            "#,
        )
        .bind(self.schema.as_str())
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
                idx.relname::text AS index_name,
                k.ord::int8 AS position,
                att.attname::text AS column_name,
                ix.indisunique AS is_unique,
                am.amname::text AS index_type
            FROM pg_index AS ix
            JOIN pg_class AS cls ON cls.oid = ix.indrelid
            JOIN pg_namespace AS ns ON ns.oid = cls.relnamespace
            JOIN pg_class AS idx ON idx.oid = ix.indexrelid
            JOIN pg_am AS am ON am.oid = idx.relam
            CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
            LEFT JOIN pg_attribute AS att ON att.attrelid = cls.oid AND att.attnum = k.attnum
            WHERE ns.nspname = $1
                AND cls.relname = $2
                AND NOT ix.indisprimary
                AND k.ord <= ix.indnkeyatts
            ORDER BY idx.relname, k.ord
            "#,
        )
        .bind(self.schema.as_str())
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::with_capacity(rows.len());
        for row in rows {
            parts.push(IndexColumn {
                index: row.try_get("index_name")?,
                position: row.try_get("position")?,
                column: row.try_get("column_name")?,
                is_unique: row.try_get("is_unique")?,
                index_type: row.try_get("index_type")?,
            });
        }
        Ok(group_index_columns(parts))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

/// Builds the native type from `information_schema.columns`; arrays and
/// user-defined types are named through `udt_name`, enum types become `enum`
/// with their labels.
fn native_type(
    data_type: &str,
    udt_name: &str,
    max_length: Option<u32>,
    numeric_precision: Option<u32>,
    numeric_scale: Option<u32>,
    datetime_precision: Option<u32>,
    enum_labels: Vec<String>,
) -> NativeType {
    match data_type {
        "ARRAY" => NativeType::named("array").with_element(udt_name.trim_start_matches('_')),
        "USER-DEFINED" if !enum_labels.is_empty() => NativeType::named("enum").with_labels(enum_labels),
        "USER-DEFINED" => NativeType::named(udt_name),
        _ => {
            let native = NativeType::named(data_type).with_length(max_length);
            let name = native.name.clone();
            match name.as_str() {
                "numeric" | "decimal" => native.with_precision(numeric_precision, numeric_scale),
                "time" | "timetz" | "timestamp" | "timestamptz" | "interval" => {
                    native.with_precision(datetime_precision, None)
                }
                _ => native,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalises_long_type_names() {
        let varchar = native_type("character varying", "varchar", Some(40), None, None, None, Vec::new());
        assert_eq!(varchar.name, "varchar");
        assert_eq!(varchar.length, Some(40));

        let stamp = native_type("timestamp with time zone", "timestamptz", None, None, None, Some(3), Vec::new());
        assert_eq!(stamp.name, "timestamptz");
        assert_eq!(stamp.precision, Some(3));

        let int = native_type("integer", "int4", None, Some(32), Some(0), None, Vec::new());
        assert_eq!(int.name, "integer");
        assert_eq!(int.precision, None);

        let money = native_type("numeric", "numeric", None, Some(12), Some(2), None, Vec::new());
        assert_eq!((money.precision, money.scale), (Some(12), Some(2)));
    }

    #[test]
    fn names_arrays_and_user_types_by_udt() {
        let tags = native_type("ARRAY", "_text", None, None, None, None, Vec::new());
        assert_eq!(tags.name, "array");
        assert_eq!(tags.element.as_deref(), Some("text"));

        let shape = native_type("USER-DEFINED", "geometry", None, None, None, None, Vec::new());
        assert_eq!(shape.name, "geometry");
        assert!(shape.labels.is_empty());
    }

    #[test]
    fn tags_enum_types_with_their_labels() {
        let labels = vec!["happy".to_string(), "sad".to_string()];
        let mood = native_type("USER-DEFINED", "mood", None, None, None, None, labels.clone());
        assert_eq!(mood.name, "enum");
        assert_eq!(mood.labels, labels);
    }
}
