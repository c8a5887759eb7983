use ponygen_config::DatabaseTarget;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::codegen::{GeneratedModel, build_models, render};
use crate::connect::connect;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;
use crate::introspect::{MetadataReader, ReadOptions, SchemaRead, read_schema};
use crate::os::write_atomic;
use crate::relations::resolve;
use crate::schema::Schema;
use crate::types::map_schema;

/// Finished output of one run. Diagnostics never appear in `source`.
#[derive(Debug, Clone)]
pub struct Generated {
    pub source: String,
    pub models: Vec<GeneratedModel>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve, map and render an already materialised schema.
pub fn generate(schema: &Schema) -> Result<Generated> {
    generate_with(schema, Diagnostics::default())
}

fn generate_with(schema: &Schema, mut diagnostics: Diagnostics) -> Result<Generated> {
    schema.validate()?;

    let resolution = resolve(schema, &mut diagnostics);
    let types = map_schema(schema, &mut diagnostics);
    let models = build_models(schema, &resolution, &types, &mut diagnostics);
    let source = render(&models);

    info!(
        "Generated {} entities from {} tables ({} warnings)",
        models.len(),
        schema.tables.len(),
        diagnostics.len()
    );

    Ok(Generated {
        source,
        models,
        diagnostics: diagnostics.into_vec(),
    })
}

/// Connect, read the whole catalog, and release the connection.
pub async fn introspect(target: &DatabaseTarget, options: &ReadOptions) -> Result<SchemaRead> {
    let reader = connect(target).await?;
    let read = read_schema(&reader, options).await;
    reader.close().await;
    read
}

/// The full pipeline against a live database: read, resolve, map, render.
pub async fn run(target: &DatabaseTarget, options: &ReadOptions) -> Result<Generated> {
    let SchemaRead { schema, diagnostics } = introspect(target, options).await?;
    generate_with(&schema, diagnostics)
}

/// Writes the source to `destination`, or to stdout when none is given.
pub fn emit(generated: &Generated, destination: Option<&Path>) -> Result<()> {
    match destination {
        Some(path) => {
            write_atomic(path, &generated.source)?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(generated.source.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
