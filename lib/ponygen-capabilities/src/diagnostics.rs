use thiserror::Error;
use tracing::warn;

/// A schema shape that was degraded rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("unsupported schema feature on `{table}`: {detail}")]
    UnsupportedSchemaFeature { table: String, detail: String },

    #[error("unknown type `{native}` for `{table}.{column}`, generated as {fallback}")]
    UnknownType {
        table: String,
        column: String,
        native: String,
        fallback: String,
    },

    #[error("name `{requested}` is already taken in {scope}, using `{resolved}`")]
    NamingCollision {
        scope: String,
        requested: String,
        resolved: String,
    },

    #[error("skipped table `{table}`: {reason}")]
    SkippedTable { table: String, reason: String },
}

/// Ordered list of diagnostics. Every entry is logged when recorded.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
