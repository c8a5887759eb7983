use ponygen_config::{DatabaseTarget, Provider};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::{Error, Result};
use crate::introspect::{MySqlReader, PostgresReader, Reader, SqliteReader};

/// Opens a single-connection pool for `target` and wraps it in the matching reader.
pub async fn connect(target: &DatabaseTarget) -> Result<Reader> {
    info!("Connecting to {} ({})", target.redacted_url(), target.provider);

    let reader = match target.provider {
        Provider::Sqlite => {
            let mut options = SqliteConnectOptions::from_str(&target.url).map_err(Error::Connection)?;
            if !target.url.contains(":memory:") {
                options = options.read_only(true);
            }
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .map_err(Error::Connection)?;
            Reader::Sqlite(SqliteReader::new(pool))
        }
        Provider::MySql => {
            let pool = MySqlPoolOptions::new()
                .max_connections(1)
                .connect(&target.url)
                .await
                .map_err(Error::Connection)?;
            Reader::MySql(MySqlReader::new(pool))
        }
        Provider::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(&target.url)
                .await
                .map_err(Error::Connection)?;
            Reader::Postgres(PostgresReader::new(pool, target.schema.clone()))
        }
    };

    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_sqlite_file_is_a_connection_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite:{}", dir.path().join("missing.db").display());
        let target = DatabaseTarget::from_url(&url, None).expect("target");

        let result = connect(&target).await;
        assert!(matches!(result, Err(Error::Connection(_))));
        assert!(!dir.path().join("missing.db").exists());
    }
}
