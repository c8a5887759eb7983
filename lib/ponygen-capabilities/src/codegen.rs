use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::naming::{Namespace, class_name};
use crate::relations::{RelationKind, Relationship, Resolution, Side};
use crate::schema::{Schema, Table};
use crate::types::{PyType, TypeMap};

const HEADER: &str = "# This is an auto-generated module with Pony ORM entities.";

// ============ Type Definitions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    PrimaryKey,
    Required,
    Optional,
    Set,
}

impl AttributeKind {
    pub fn token(self) -> &'static str {
        match self {
            AttributeKind::PrimaryKey => "PrimaryKey",
            AttributeKind::Required => "Required",
            AttributeKind::Optional => "Optional",
            AttributeKind::Set => "Set",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Native(PyType),
    /// Another generated entity, referenced by class name.
    Entity(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(u32),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub type_ref: TypeRef,
    /// Keyword options, already in emit order.
    pub options: Vec<(&'static str, OptionValue)>,
}

/// Class-level declarations emitted after the attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    PrimaryKey(Vec<String>),
    CompositeKey(Vec<String>),
    CompositeIndex(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModel {
    pub class_name: String,
    pub table_name: String,
    pub attributes: Vec<Attribute>,
    pub constraints: Vec<Constraint>,
}

impl GeneratedModel {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relation_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|a| matches!(a.type_ref, TypeRef::Entity(_)))
    }
}

// ============ Rendering ============

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => write!(f, "True"),
            OptionValue::Bool(false) => write!(f, "False"),
            OptionValue::Int(value) => write!(f, "{}", value),
            OptionValue::Str(value) => write!(f, "{}", py_str(value)),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args = vec![match &self.type_ref {
            TypeRef::Native(py_type) => py_type.token().to_string(),
            TypeRef::Entity(class) => py_str(class),
        }];
        args.extend(self.options.iter().map(|(key, value)| format!("{}={}", key, value)));
        write!(f, "{} = {}({})", self.name, self.kind.token(), args.join(", "))
    }
}

impl Constraint {
    fn function(&self) -> &'static str {
        match self {
            Constraint::PrimaryKey(_) => "PrimaryKey",
            Constraint::CompositeKey(_) => "composite_key",
            Constraint::CompositeIndex(_) => "composite_index",
        }
    }

    fn attributes(&self) -> &[String] {
        match self {
            Constraint::PrimaryKey(names) | Constraint::CompositeKey(names) | Constraint::CompositeIndex(names) => {
                names
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function(), self.attributes().join(", "))
    }
}

/// Renders the module: header, imports for the names actually used, then one class per model.
pub fn render(models: &[GeneratedModel]) -> String {
    let mut imports: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    imports.entry("pony.orm").or_default().insert("Database");
    for model in models {
        for attribute in &model.attributes {
            imports.entry("pony.orm").or_default().insert(attribute.kind.token());
            if let TypeRef::Native(py_type) = attribute.type_ref
                && let Some(module) = py_type.module()
            {
                imports.entry(module).or_default().insert(py_type.token());
            }
        }
        for constraint in &model.constraints {
            imports.entry("pony.orm").or_default().insert(constraint.function());
        }
    }

    let mut lines = vec![HEADER.to_string(), String::new()];
    for (module, names) in &imports {
        let names: Vec<&str> = names.iter().copied().collect();
        lines.push(format!("from {} import {}", module, names.join(", ")));
    }
    lines.push(String::new());
    lines.push("db = Database()".to_string());

    for model in models {
        lines.push(String::new());
        lines.push(String::new());
        lines.push(format!("class {}(db.Entity):", model.class_name));
        lines.push(format!("    _table_ = {}", py_str(&model.table_name)));
        for attribute in &model.attributes {
            lines.push(format!("    {}", attribute));
        }
        for constraint in &model.constraints {
            lines.push(format!("    {}", constraint));
        }
    }

    let mut source = lines.join("\n");
    source.push('\n');
    source
}

/// Double-quoted Python string literal.
fn py_str(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for c in value.chars() {
        match c {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c if c.is_control() => literal.push_str(&format!("\\x{:02x}", c as u32)),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

// ============ Model Building ============

/// Builds one model per non-junction table, parents before children.
pub fn build_models(
    schema: &Schema,
    resolution: &Resolution,
    types: &TypeMap,
    diagnostics: &mut Diagnostics,
) -> Vec<GeneratedModel> {
    let emitted: BTreeSet<String> = schema
        .tables
        .keys()
        .filter(|t| !resolution.is_junction(t))
        .cloned()
        .collect();
    let classes = class_names(&emitted, diagnostics);

    let models: Vec<GeneratedModel> = schema
        .dependency_order(&emitted)
        .iter()
        .filter_map(|name| schema.table(name))
        .map(|table| build_model(table, resolution, types, &classes, diagnostics))
        .collect();

    debug!("built {} models", models.len());
    models
}

fn class_names(tables: &BTreeSet<String>, diagnostics: &mut Diagnostics) -> BTreeMap<String, String> {
    let mut module = Namespace::default();
    let mut classes = BTreeMap::new();
    for table in tables {
        let requested = class_name(table);
        let resolved = module.claim(&requested);
        if resolved != requested {
            diagnostics.push(Diagnostic::NamingCollision {
                scope: "module".to_string(),
                requested,
                resolved: resolved.clone(),
            });
        }
        classes.insert(table.clone(), resolved);
    }
    classes
}

fn build_model(
    table: &Table,
    resolution: &Resolution,
    types: &TypeMap,
    classes: &BTreeMap<String, String>,
    diagnostics: &mut Diagnostics,
) -> GeneratedModel {
    if table.primary_key.is_empty() {
        diagnostics.push(Diagnostic::UnsupportedSchemaFeature {
            table: table.name.clone(),
            detail: "no primary key; Pony will add an implicit `id` attribute".to_string(),
        });
    }

    let sole_key = match table.primary_key.as_slice() {
        [column] => Some(column.as_str()),
        _ => None,
    };
    let ends = resolution.ends_on(&table.name);
    let mut key_ends = BTreeSet::new();
    let mut attributes = Vec::new();

    // Key block, in key order: a sole key is a PrimaryKey, composite members
    // are Required. Key columns that hold a reference keep their relation.
    for column in &table.primary_key {
        if let Some(attribute) = resolution.data_attribute(&table.name, column) {
            let kind = if sole_key.is_some() {
                AttributeKind::PrimaryKey
            } else {
                AttributeKind::Required
            };
            attributes.push(data_attribute(table, column, attribute, kind, types));
        } else if let Some(index) = ends
            .iter()
            .position(|(side, r)| *side == Side::Source && r.column.as_deref() == Some(column.as_str()))
        {
            let (side, relationship) = ends[index];
            attributes.push(relation_attribute(side, relationship, resolution, classes, sole_key.is_some()));
            key_ends.insert(index);
        }
    }

    for (column, attribute) in resolution.data_columns(&table.name) {
        if table.is_primary_key(column) {
            continue;
        }
        let kind = match types.get(&table.name, column) {
            Some(mapped) if mapped.nullable => AttributeKind::Optional,
            _ => AttributeKind::Required,
        };
        attributes.push(data_attribute(table, column, attribute, kind, types));
    }

    for (index, (side, relationship)) in ends.iter().enumerate() {
        if !key_ends.contains(&index) {
            attributes.push(relation_attribute(*side, relationship, resolution, classes, false));
        }
    }

    GeneratedModel {
        class_name: class_of(classes, &table.name),
        table_name: table.name.clone(),
        attributes,
        constraints: constraints(table, resolution),
    }
}

fn class_of(classes: &BTreeMap<String, String>, table: &str) -> String {
    classes.get(table).cloned().unwrap_or_else(|| class_name(table))
}

fn data_attribute(table: &Table, column: &str, attribute: &str, kind: AttributeKind, types: &TypeMap) -> Attribute {
    let mapped = types.get(&table.name, column);
    let py_type = mapped.map(|m| m.py_type).unwrap_or(PyType::LongStr);
    let info = table.column(column);

    let mut options = Vec::new();
    if let Some(mapped) = mapped {
        let type_options = &mapped.options;
        if let Some(max_len) = type_options.max_len {
            options.push(("max_len", OptionValue::Int(max_len)));
        }
        if let Some(size) = type_options.size {
            options.push(("size", OptionValue::Int(u32::from(size))));
        }
        if type_options.unsigned {
            options.push(("unsigned", OptionValue::Bool(true)));
        }
        if let Some(precision) = type_options.precision {
            options.push(("precision", OptionValue::Int(precision)));
        }
        if let Some(scale) = type_options.scale {
            options.push(("scale", OptionValue::Int(scale)));
        }
    }

    let auto = kind == AttributeKind::PrimaryKey && py_type == PyType::Int && info.is_some_and(|c| c.auto_increment);
    if auto {
        options.push(("auto", OptionValue::Bool(true)));
    }
    if !table.is_primary_key(column) && table.is_unique_column(column) {
        options.push(("unique", OptionValue::Bool(true)));
    }
    if kind == AttributeKind::Optional {
        options.push(("nullable", OptionValue::Bool(true)));
    }
    if !auto && let Some(default) = info.and_then(|c| c.default.as_ref()) {
        options.push(("sql_default", OptionValue::Str(default.clone())));
    }
    if attribute != column {
        options.push(("column", OptionValue::Str(column.to_string())));
    }

    Attribute {
        name: attribute.to_string(),
        kind,
        type_ref: TypeRef::Native(py_type),
        options,
    }
}

fn relation_attribute(
    side: Side,
    relationship: &Relationship,
    resolution: &Resolution,
    classes: &BTreeMap<String, String>,
    is_key: bool,
) -> Attribute {
    let end = relationship.end(side);
    let other = relationship.opposite(side);

    let holds_key = side == Side::Source && relationship.column.is_some();
    let kind = match relationship.kind_from(side) {
        RelationKind::OneToMany | RelationKind::ManyToMany => AttributeKind::Set,
        _ if is_key => AttributeKind::PrimaryKey,
        _ if holds_key && relationship.required => AttributeKind::Required,
        _ => AttributeKind::Optional,
    };

    let mut options = Vec::new();
    if holds_key
        && let Some(column) = &relationship.column
        && *column != end.attribute
    {
        options.push(("column", OptionValue::Str(column.clone())));
    }
    if let Some(junction) = &relationship.junction {
        let column = match side {
            Side::Source => &junction.target_column,
            Side::Target => &junction.source_column,
        };
        options.push(("column", OptionValue::Str(column.clone())));
        options.push(("table", OptionValue::Str(junction.table.clone())));
    }
    if resolution.needs_reverse(relationship) {
        options.push(("reverse", OptionValue::Str(other.attribute.clone())));
    }

    Attribute {
        name: end.attribute.clone(),
        kind,
        type_ref: TypeRef::Entity(class_of(classes, &other.table)),
        options,
    }
}

fn constraints(table: &Table, resolution: &Resolution) -> Vec<Constraint> {
    let attributes_for = |columns: &[String]| -> Option<Vec<String>> {
        columns
            .iter()
            .map(|c| resolution.attribute_for_column(&table.name, c).map(str::to_string))
            .collect()
    };

    let mut constraints = Vec::new();
    if table.primary_key.len() > 1
        && let Some(names) = attributes_for(&table.primary_key)
    {
        constraints.push(Constraint::PrimaryKey(names));
    }

    let mut seen = BTreeSet::new();
    for index in &table.indexes {
        if index.columns.len() < 2 || index.columns == table.primary_key {
            continue;
        }
        let Some(names) = attributes_for(&index.columns) else {
            continue;
        };
        if !seen.insert((index.is_unique, names.clone())) {
            continue;
        }
        constraints.push(if index.is_unique {
            Constraint::CompositeKey(names)
        } else {
            Constraint::CompositeIndex(names)
        });
    }
    constraints
}
