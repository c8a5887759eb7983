use anyhow::{Context, Result};
use ponygen_capabilities::{TomlSchema, emit, generate};
use std::path::Path;
use tracing::info;

use super::ConnectArgs;

pub async fn run(args: &ConnectArgs, out: Option<&Path>, snapshot: Option<&Path>) -> Result<()> {
    let generated = match snapshot {
        Some(path) => {
            info!("Reading schema snapshot {}", path.display());
            let schema = TomlSchema::from_file(path)
                .with_context(|| format!("Failed to read schema snapshot {}", path.display()))?
                .into_schema();
            generate(&schema)?
        }
        None => ponygen_capabilities::run(&args.target()?, &args.read_options()).await?,
    };

    emit(&generated, out)?;

    if !generated.diagnostics.is_empty() {
        info!(
            "Generated with {} warnings",
            generated.diagnostics.len()
        );
    }
    Ok(())
}
