mod config;
mod provider;
mod target;

pub use config::{DATABASE_URL_KEY, retrieve_from_env};
pub use provider::Provider;
pub use target::{ConnectionParams, DatabaseTarget};
