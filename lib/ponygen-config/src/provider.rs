use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database engine whose catalog is read. Selects the metadata reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Sqlite,
    MySql,
    Postgres,
}

impl Provider {
    /// Infers the provider from the scheme of a connection URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .with_context(|| format!("Connection URL has no scheme: {}", url))?;
        scheme
            .parse()
            .with_context(|| format!("Cannot infer database provider from URL scheme `{}`", scheme))
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Provider::Sqlite => "sqlite",
            Provider::MySql => "mysql",
            Provider::Postgres => "postgres",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Provider::Sqlite => None,
            Provider::MySql => Some(3306),
            Provider::Postgres => Some(5432),
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Provider::Sqlite),
            "mysql" | "mariadb" => Ok(Provider::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Provider::Postgres),
            other => bail!("Unsupported database provider: {}", other),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("SQLite3".parse::<Provider>().unwrap(), Provider::Sqlite);
        assert_eq!("mariadb".parse::<Provider>().unwrap(), Provider::MySql);
        assert_eq!("postgresql".parse::<Provider>().unwrap(), Provider::Postgres);
        assert!("oracle".parse::<Provider>().is_err());
    }

    #[test]
    fn infers_from_url_scheme() {
        assert_eq!(Provider::from_url("sqlite::memory:").unwrap(), Provider::Sqlite);
        assert_eq!(
            Provider::from_url("postgresql://app@localhost/app").unwrap(),
            Provider::Postgres
        );
        assert_eq!(Provider::from_url("mysql://root@db:3306/shop").unwrap(), Provider::MySql);
        assert!(Provider::from_url("no-scheme-here").is_err());
    }
}
