mod codegen;
mod connect;
mod diagnostics;
mod error;
mod introspect;
mod naming;
mod os;
mod pipeline;
mod relations;
mod schema;
#[cfg(test)]
mod test_support;
mod toml_schema;
mod types;

pub use codegen::{Attribute, AttributeKind, Constraint, GeneratedModel, OptionValue, TypeRef, build_models, render};
pub use connect::connect;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{Error, Result};
pub use introspect::{
    MetadataReader, MySqlReader, PostgresReader, ReadOptions, Reader, SchemaRead, SqliteReader, read_schema,
};
pub use naming::{Namespace, attribute_name, class_name, pluralize, singularize};
pub use os::write_atomic;
pub use pipeline::{Generated, emit, generate, introspect, run};
pub use relations::{Junction, RelationEnd, RelationKind, Relationship, Resolution, Side, resolve};
pub use schema::{Column, ForeignKey, Index, NativeType, Ordinality, Schema, Table};
pub use toml_schema::{TomlSchema, TomlTable};
pub use types::{MappedType, PyType, TypeMap, TypeOptions, map_schema, map_type};
