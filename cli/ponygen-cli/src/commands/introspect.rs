use anyhow::Result;
use ponygen_capabilities::{TomlSchema, introspect};
use std::path::Path;
use tracing::info;

use super::ConnectArgs;

pub async fn run(args: &ConnectArgs, output: &Path) -> Result<()> {
    let target = args.target()?;
    let read = introspect(&target, &args.read_options()).await?;

    TomlSchema::from_schema(&read.schema, Some(target.provider)).write_file(output)?;

    info!(
        "Wrote {} tables to {}",
        read.schema.tables.len(),
        output.display()
    );
    Ok(())
}
