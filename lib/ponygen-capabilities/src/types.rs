use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::schema::{Column, NativeType, Schema};

/// Attribute type understood by Pony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PyType {
    Int,
    Float,
    Decimal,
    Str,
    LongStr,
    Bool,
    Date,
    DateTime,
    Time,
    TimeDelta,
    Bytes,
    Uuid,
    Json,
    IntArray,
    FloatArray,
    StrArray,
}

impl PyType {
    pub fn token(self) -> &'static str {
        match self {
            PyType::Int => "int",
            PyType::Float => "float",
            PyType::Decimal => "Decimal",
            PyType::Str => "str",
            PyType::LongStr => "LongStr",
            PyType::Bool => "bool",
            PyType::Date => "date",
            PyType::DateTime => "datetime",
            PyType::Time => "time",
            PyType::TimeDelta => "timedelta",
            PyType::Bytes => "bytes",
            PyType::Uuid => "UUID",
            PyType::Json => "Json",
            PyType::IntArray => "IntArray",
            PyType::FloatArray => "FloatArray",
            PyType::StrArray => "StrArray",
        }
    }

    /// Module the token has to be imported from; builtins need nothing.
    pub fn module(self) -> Option<&'static str> {
        match self {
            PyType::Int | PyType::Float | PyType::Str | PyType::Bool | PyType::Bytes => None,
            PyType::Decimal => Some("decimal"),
            PyType::Date | PyType::DateTime | PyType::Time | PyType::TimeDelta => Some("datetime"),
            PyType::Uuid => Some("uuid"),
            PyType::LongStr | PyType::Json | PyType::IntArray | PyType::FloatArray | PyType::StrArray => {
                Some("pony.orm")
            }
        }
    }
}

/// Type-specific generation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeOptions {
    pub max_len: Option<u32>,
    /// Integer width in bits; Pony's default of 32 is left implicit.
    pub size: Option<u8>,
    pub unsigned: bool,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub py_type: PyType,
    pub options: TypeOptions,
    pub nullable: bool,
    /// False when the native type was not recognised and `py_type` is a fallback.
    pub known: bool,
}

/// Mapped type of every column, keyed by `(table, column)`.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    types: BTreeMap<(String, String), MappedType>,
}

impl TypeMap {
    pub fn get(&self, table: &str, column: &str) -> Option<&MappedType> {
        self.types.get(&(table.to_string(), column.to_string()))
    }
}

/// Maps a native column type to a Pony type. Pure; unknown types come back with `known == false`.
pub fn map_type(native: &NativeType, nullable: bool) -> MappedType {
    let mut options = TypeOptions::default();
    let mut known = true;

    let py_type = match native.name.as_str() {
        "tinyint" if native.length == Some(1) && !native.unsigned => PyType::Bool,
        "tinyint" => {
            options.size = Some(8);
            PyType::Int
        }
        "smallint" | "int2" | "smallserial" | "serial2" => {
            options.size = Some(16);
            PyType::Int
        }
        "mediumint" => {
            options.size = Some(24);
            PyType::Int
        }
        "int" | "integer" | "int4" | "serial" | "serial4" | "year" => PyType::Int,
        "bigint" | "int8" | "bigserial" | "serial8" => {
            options.size = Some(64);
            PyType::Int
        }
        "bool" | "boolean" => PyType::Bool,
        "bit" if native.length.unwrap_or(1) == 1 => PyType::Bool,
        "bit" | "varbit" => {
            options.size = Some(64);
            PyType::Int
        }
        "real" | "float" | "float4" | "double" | "float8" => PyType::Float,
        "decimal" | "numeric" | "dec" | "fixed" | "money" => {
            options.precision = native.precision;
            options.scale = native.scale;
            PyType::Decimal
        }
        "char" | "varchar" | "nchar" | "nvarchar" | "bpchar" => {
            options.max_len = native.length;
            PyType::Str
        }
        "inet" | "cidr" | "macaddr" | "macaddr8" => PyType::Str,
        "enum" => {
            options.max_len = native.labels.iter().map(|label| label.chars().count() as u32).max();
            PyType::Str
        }
        // A set value holds any combination of its labels, comma separated.
        "set" => {
            if !native.labels.is_empty() {
                let joined: usize = native.labels.iter().map(|label| label.chars().count() + 1).sum();
                options.max_len = Some(joined as u32 - 1);
            }
            PyType::Str
        }
        "text" | "tinytext" | "mediumtext" | "longtext" | "clob" | "citext" | "xml" => PyType::LongStr,
        "date" => PyType::Date,
        "datetime" | "timestamp" | "timestamptz" | "smalldatetime" => {
            options.precision = non_default_precision(native.precision);
            PyType::DateTime
        }
        "time" | "timetz" => {
            options.precision = non_default_precision(native.precision);
            PyType::Time
        }
        "interval" => PyType::TimeDelta,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" | "binary" | "varbinary" => PyType::Bytes,
        "uuid" => PyType::Uuid,
        "json" | "jsonb" => PyType::Json,
        "array" => match native.element.as_deref() {
            Some("int2" | "int4" | "int8" | "integer" | "smallint" | "bigint") => PyType::IntArray,
            Some("float4" | "float8" | "real" | "double" | "numeric") => PyType::FloatArray,
            Some("text" | "varchar" | "bpchar" | "char") => PyType::StrArray,
            _ => {
                known = false;
                PyType::LongStr
            }
        },
        other => {
            known = false;
            fallback(other)
        }
    };

    if py_type == PyType::Int {
        options.unsigned = native.unsigned;
    }

    MappedType {
        py_type,
        options,
        nullable,
        known,
    }
}

/// Maps every column of `schema`, recording an [`Diagnostic::UnknownType`] for each fallback.
pub fn map_schema(schema: &Schema, diagnostics: &mut Diagnostics) -> TypeMap {
    let mut types = BTreeMap::new();
    for table in schema.tables.values() {
        for column in table.ordered_columns() {
            let mapped = map_column(&table.name, column, diagnostics);
            types.insert((table.name.clone(), column.name.clone()), mapped);
        }
    }
    TypeMap { types }
}

fn map_column(table: &str, column: &Column, diagnostics: &mut Diagnostics) -> MappedType {
    let mapped = map_type(&column.native_type, column.is_nullable);
    if !mapped.known {
        diagnostics.push(Diagnostic::UnknownType {
            table: table.to_string(),
            column: column.name.clone(),
            native: column.native_type.describe(),
            fallback: mapped.py_type.token().to_string(),
        });
    }
    mapped
}

/// Binary-looking names become `bytes`, everything else text.
fn fallback(name: &str) -> PyType {
    if ["blob", "bin", "byte", "raw", "image"].iter().any(|hint| name.contains(hint)) {
        PyType::Bytes
    } else {
        PyType::LongStr
    }
}

/// Pony stores fractional seconds with precision 6 unless told otherwise.
fn non_default_precision(precision: Option<u32>) -> Option<u32> {
    precision.filter(|p| *p != 6)
}
