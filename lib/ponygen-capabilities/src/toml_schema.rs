use ponygen_config::Provider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::os::write_atomic;
use crate::schema::{Column, ForeignKey, Index, Schema, Table};

// ============ Type Definitions ============

/// On-disk snapshot of a [`Schema`], for generating without a live database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub table: Vec<TomlTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlTable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    pub column: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_key: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index: Vec<Index>,
}

// ============ TomlSchema Methods ============

impl TomlSchema {
    /// Read a TomlSchema from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let toml_str = fs::read_to_string(path)?;
        let toml_schema: TomlSchema = toml::from_str(&toml_str)?;
        Ok(toml_schema)
    }

    /// Write this TomlSchema to a file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        write_atomic(path, &toml_string)
    }

    pub fn from_schema(schema: &Schema, provider: Option<Provider>) -> Self {
        // BTreeMap iteration keeps tables sorted by name.
        let table = schema
            .tables
            .values()
            .map(|table| TomlTable {
                name: table.name.clone(),
                primary_key: table.primary_key.clone(),
                column: table.ordered_columns().into_iter().cloned().collect(),
                foreign_key: table.foreign_keys.clone(),
                index: table.indexes.clone(),
            })
            .collect();

        TomlSchema { provider, table }
    }

    pub fn into_schema(self) -> Schema {
        Schema::from_tables(self.table.into_iter().map(|table| Table {
            name: table.name,
            columns: table.column,
            primary_key: table.primary_key,
            foreign_keys: table.foreign_key,
            indexes: table.index,
        }))
    }
}
