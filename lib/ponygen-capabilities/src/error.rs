use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a run. Schema-shape problems are [`crate::Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("could not list tables: {0}")]
    Catalog(#[source] sqlx::Error),

    #[error("table `{table}` has a foreign key to unknown table `{referenced}`")]
    DanglingReference { table: String, referenced: String },

    #[error("foreign key on `{table}` names unknown column `{owner}.{column}`")]
    DanglingColumn {
        table: String,
        owner: String,
        column: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
