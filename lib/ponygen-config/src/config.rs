use anyhow::{Context, Result};
use std::env;

/// Environment variable consulted when no connection is given on the command line.
pub const DATABASE_URL_KEY: &str = "DATABASE_URL";

/// Reads `key` from the process environment, loading `.env` first if present.
pub fn retrieve_from_env(key: &str) -> Result<String> {
    dotenvy::dotenv().ok();
    let value = env::var(key).with_context(|| format!("Missing environment variable: {}", key))?;
    if value.trim().is_empty() {
        anyhow::bail!("Environment variable {} is empty", key);
    }
    Ok(value)
}
