use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

// ============ Type Definitions ============

/// Engine-agnostic snapshot of the catalog: tables as nodes, foreign keys as edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: BTreeMap<String, Table>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub native_type: NativeType,
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// 1-based position in the table definition.
    pub ordinal: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
}

/// Column type after the reader normalised the engine's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeType {
    /// Canonical lower-case name, e.g. `varchar`, `timestamptz`, `array`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unsigned: bool,
    /// Element type of an `array` column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// Allowed values of an `enum` or `set` column, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordinality {
    Single,
    /// Recorded, but never promoted to a relationship.
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub index_type: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ============ NativeType ============

const LENGTH_TYPES: &[&str] = &[
    "char", "varchar", "nchar", "nvarchar", "binary", "varbinary", "bit", "varbit", "tinyint", "smallint",
    "mediumint", "int", "integer", "bigint",
];

const PRECISION_TYPES: &[&str] = &[
    "decimal", "numeric", "dec", "fixed", "float", "double", "real", "time", "timetz", "datetime",
    "timestamp", "timestamptz", "interval",
];

impl NativeType {
    pub fn named(name: &str) -> Self {
        Self {
            name: canonical_name(name),
            ..Default::default()
        }
    }

    /// Parses a declared type such as `VARCHAR(20)`, `decimal(10, 2)` or `int(10) unsigned`.
    pub fn parse_declared(declared: &str) -> Self {
        if let Some((base, list)) = declared.trim().split_once('(') {
            let base = base.trim().to_ascii_lowercase();
            if base == "enum" || base == "set" {
                return Self::named(&base).with_labels(parse_labels(list));
            }
        }

        let lowered = declared.trim().to_ascii_lowercase();
        let unsigned = lowered.split_whitespace().any(|word| word == "unsigned");

        let (base, args) = match lowered.split_once('(') {
            Some((base, rest)) => {
                let (inner, suffix) = rest.split_once(')').unwrap_or((rest, ""));
                (format!("{} {}", base.trim(), suffix.trim()), inner.to_string())
            }
            None => (lowered.clone(), String::new()),
        };
        let base: Vec<&str> = base
            .split_whitespace()
            .filter(|word| !matches!(*word, "unsigned" | "signed" | "zerofill"))
            .collect();

        let mut native = Self::named(&base.join(" "));
        native.unsigned = unsigned;

        let numbers: Vec<Option<u32>> = args.split(',').map(|arg| arg.trim().parse().ok()).collect();
        let first = numbers.first().copied().flatten();
        let second = numbers.get(1).copied().flatten();
        if LENGTH_TYPES.contains(&native.name.as_str()) {
            native.length = first;
        } else if PRECISION_TYPES.contains(&native.name.as_str()) {
            native.precision = first;
            native.scale = second;
        }
        native
    }

    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    pub fn with_precision(mut self, precision: Option<u32>, scale: Option<u32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_element(mut self, element: &str) -> Self {
        self.element = Some(canonical_name(element));
        self
    }

    /// Human readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match (&self.element, self.length, self.precision) {
            (Some(element), _, _) => format!("{}[]", element),
            (None, Some(length), _) => format!("{}({})", self.name, length),
            (None, None, Some(precision)) => match self.scale {
                Some(scale) => format!("{}({}, {})", self.name, precision, scale),
                None => format!("{}({})", self.name, precision),
            },
            _ => self.name.clone(),
        }
    }
}

/// Reads the quoted values of `'a','b''c')`; a doubled quote is a literal quote.
fn parse_labels(list: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let mut chars = list.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut label = String::new();
        while let Some(c) = chars.next() {
            if c != '\'' {
                label.push(c);
            } else if chars.peek() == Some(&'\'') {
                chars.next();
                label.push('\'');
            } else {
                break;
            }
        }
        labels.push(label);
    }
    labels
}

/// Folds multi-word catalog spellings into one canonical name.
pub(crate) fn canonical_name(name: &str) -> String {
    let lowered = name.trim().to_ascii_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.as_str() {
        "character varying" | "varying character" => "varchar",
        "character" => "char",
        "native character" | "national character" => "nchar",
        "national character varying" | "nvarchar2" => "nvarchar",
        "bit varying" => "varbit",
        "double precision" => "double",
        "unsigned big int" | "big int" => "bigint",
        "timestamp without time zone" => "timestamp",
        "timestamp with time zone" => "timestamptz",
        "time without time zone" => "time",
        "time with time zone" => "timetz",
        other => other,
    }
    .to_string()
}

// ============ ForeignKey / Table ============

impl ForeignKey {
    pub fn ordinality(&self) -> Ordinality {
        if self.columns.len() == 1 && self.referenced_columns.len() == 1 {
            Ordinality::Single
        } else {
            Ordinality::Composite
        }
    }

    pub fn is_composite(&self) -> bool {
        self.ordinality() == Ordinality::Composite
    }

    /// The source column of a single-column key.
    pub fn column(&self) -> Option<&str> {
        match self.ordinality() {
            Ordinality::Single => self.columns.first().map(String::as_str),
            Ordinality::Composite => None,
        }
    }

    pub fn referenced_column(&self) -> Option<&str> {
        match self.ordinality() {
            Ordinality::Single => self.referenced_columns.first().map(String::as_str),
            Ordinality::Composite => None,
        }
    }
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Columns in definition order.
    pub fn ordered_columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.iter().collect();
        columns.sort_by_key(|c| c.ordinal);
        columns
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
    }

    /// Whether `column` alone is guaranteed unique: the sole primary key or a one-column unique index.
    pub fn is_unique_column(&self, column: &str) -> bool {
        (self.primary_key.len() == 1 && self.primary_key[0] == column)
            || self
                .indexes
                .iter()
                .any(|i| i.is_unique && i.columns.len() == 1 && i.columns[0] == column)
    }
}

// ============ Schema ============

impl Schema {
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Schema {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Checks that every foreign key lands on an existing table and column.
    pub fn validate(&self) -> Result<()> {
        for table in self.tables.values() {
            for fk in &table.foreign_keys {
                let Some(target) = self.tables.get(&fk.referenced_table) else {
                    return Err(Error::DanglingReference {
                        table: table.name.clone(),
                        referenced: fk.referenced_table.clone(),
                    });
                };
                if let Some(column) = fk.columns.iter().find(|c| !table.has_column(c)) {
                    return Err(Error::DanglingColumn {
                        table: table.name.clone(),
                        owner: table.name.clone(),
                        column: column.clone(),
                    });
                }
                if let Some(column) = fk.referenced_columns.iter().find(|c| !target.has_column(c)) {
                    return Err(Error::DanglingColumn {
                        table: table.name.clone(),
                        owner: target.name.clone(),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of foreign keys, from any table, that point at `table`.
    pub fn references_to(&self, table: &str) -> usize {
        self.tables
            .values()
            .flat_map(|t| t.foreign_keys.iter())
            .filter(|fk| fk.referenced_table == table)
            .count()
    }

    /// Orders `include` so referenced tables come before the tables pointing at them.
    /// Ties are broken by name; a cycle is broken at its smallest name.
    pub fn dependency_order(&self, include: &BTreeSet<String>) -> Vec<String> {
        let mut ordered = Vec::new();
        let mut remaining: BTreeSet<String> = include.clone();

        while !remaining.is_empty() {
            let ready = remaining.iter().find(|name| {
                self.tables.get(*name).is_none_or(|table| {
                    table.foreign_keys.iter().all(|fk| {
                        &fk.referenced_table == *name || !remaining.contains(&fk.referenced_table)
                    })
                })
            });

            let next = match ready {
                Some(name) => name.clone(),
                None => match remaining.first() {
                    Some(name) => name.clone(),
                    None => break,
                },
            };
            remaining.remove(&next);
            ordered.push(next);
        }

        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, ordinal: u32) -> Column {
        Column {
            name: name.into(),
            native_type: NativeType::named("integer"),
            is_nullable: false,
            default: None,
            ordinal,
            auto_increment: false,
        }
    }

    fn table(name: &str, fks: &[(&str, &str)]) -> Table {
        let mut columns = vec![column("id", 1)];
        columns.extend(fks.iter().enumerate().map(|(i, (c, _))| column(c, i as u32 + 2)));
        Table {
            name: name.into(),
            columns,
            primary_key: vec!["id".into()],
            foreign_keys: fks
                .iter()
                .map(|(c, t)| ForeignKey {
                    name: None,
                    columns: vec![c.to_string()],
                    referenced_table: t.to_string(),
                    referenced_columns: vec!["id".into()],
                })
                .collect(),
            indexes: vec![],
        }
    }

    #[test]
    fn parses_declared_types() {
        let varchar = NativeType::parse_declared("VARCHAR(20)");
        assert_eq!(varchar.name, "varchar");
        assert_eq!(varchar.length, Some(20));

        let decimal = NativeType::parse_declared("decimal(10, 2) unsigned");
        assert_eq!(decimal.name, "decimal");
        assert_eq!((decimal.precision, decimal.scale), (Some(10), Some(2)));
        assert!(decimal.unsigned);

        let pg = NativeType::parse_declared("character varying(40)");
        assert_eq!(pg.name, "varchar");
        assert_eq!(pg.length, Some(40));

        let int = NativeType::parse_declared("int(10) unsigned zerofill");
        assert_eq!(int.name, "int");
        assert!(int.unsigned);

        assert_eq!(NativeType::parse_declared("").name, "");
        assert_eq!(NativeType::parse_declared("UNSIGNED BIG INT").name, "bigint");
    }

    #[test]
    fn parses_enum_and_set_labels() {
        let status = NativeType::parse_declared("enum('draft','Published','it''s, done')");
        assert_eq!(status.name, "enum");
        assert_eq!(status.labels, vec!["draft", "Published", "it's, done"]);

        let flags = NativeType::parse_declared("SET('a','b')");
        assert_eq!(flags.name, "set");
        assert_eq!(flags.labels, vec!["a", "b"]);
    }

    #[test]
    fn validate_rejects_dangling_tables() {
        let schema = Schema::from_tables([table("book", &[("author_id", "author")])]);
        match schema.validate() {
            Err(Error::DanglingReference { table, referenced }) => {
                assert_eq!(table, "book");
                assert_eq!(referenced, "author");
            }
            other => panic!("expected dangling reference, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_unknown_columns() {
        let mut book = table("book", &[("author_id", "author")]);
        book.foreign_keys[0].referenced_columns = vec!["uuid".into()];
        let schema = Schema::from_tables([table("author", &[]), book]);
        assert!(matches!(schema.validate(), Err(Error::DanglingColumn { column, .. }) if column == "uuid"));
    }

    #[test]
    fn dependency_order_puts_parents_first() {
        let schema = Schema::from_tables([
            table("author", &[]),
            table("book", &[("author_id", "author"), ("series_id", "series")]),
            table("series", &[("publisher_id", "publisher")]),
            table("publisher", &[]),
        ]);
        let all: BTreeSet<String> = schema.tables.keys().cloned().collect();
        assert_eq!(
            schema.dependency_order(&all),
            vec!["author", "publisher", "series", "book"]
        );
    }

    #[test]
    fn dependency_order_breaks_cycles_by_name() {
        let schema = Schema::from_tables([
            table("b", &[("a_id", "a")]),
            table("a", &[("b_id", "b")]),
            table("c", &[("c_id", "c")]),
        ]);
        let all: BTreeSet<String> = schema.tables.keys().cloned().collect();
        assert_eq!(schema.dependency_order(&all), vec!["c", "a", "b"]);
    }
}
