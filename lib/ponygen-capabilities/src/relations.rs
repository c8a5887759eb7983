use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::naming::{Namespace, attribute_name, plural_attribute, singular_attribute};
use crate::schema::{ForeignKey, Schema, Table};

// ============ Type Definitions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    OneToMany,
    ManyToOne,
    OneToOne,
    ManyToMany,
}

impl RelationKind {
    pub fn inverse(self) -> Self {
        match self {
            RelationKind::OneToMany => RelationKind::ManyToOne,
            RelationKind::ManyToOne => RelationKind::OneToMany,
            other => other,
        }
    }
}

/// One side of a relationship: the table it lives on and its attribute name there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEnd {
    pub table: String,
    pub attribute: String,
}

/// The table a many-to-many relationship was collapsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    pub table: String,
    /// Junction column referencing the source table.
    pub source_column: String,
    /// Junction column referencing the target table.
    pub target_column: String,
}

/// A resolved edge. For foreign-key edges `source` owns the key column;
/// for many-to-many edges it is the table referenced by the junction's first key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Cardinality seen from `source`.
    pub kind: RelationKind,
    pub source: RelationEnd,
    pub target: RelationEnd,
    /// Foreign-key column on `source`, absent for many-to-many.
    pub column: Option<String>,
    pub required: bool,
    pub junction: Option<Junction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Relationship {
    pub fn kind_from(&self, side: Side) -> RelationKind {
        match side {
            Side::Source => self.kind,
            Side::Target => self.kind.inverse(),
        }
    }

    pub fn end(&self, side: Side) -> &RelationEnd {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn opposite(&self, side: Side) -> &RelationEnd {
        match side {
            Side::Source => &self.target,
            Side::Target => &self.source,
        }
    }

    pub fn is_self_referencing(&self) -> bool {
        self.source.table == self.target.table
    }

    fn pair(&self) -> (&str, &str) {
        let (a, b) = (self.source.table.as_str(), self.target.table.as_str());
        if a <= b { (a, b) } else { (b, a) }
    }
}

/// Output of [`resolve`]: relationships in discovery order plus the attribute
/// names given to every remaining data column.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub relationships: Vec<Relationship>,
    pub junctions: BTreeSet<String>,
    data: BTreeMap<String, Vec<(String, String)>>,
}

impl Resolution {
    pub fn is_junction(&self, table: &str) -> bool {
        self.junctions.contains(table)
    }

    /// `(column, attribute)` pairs for columns emitted as plain attributes, in column order.
    pub fn data_columns(&self, table: &str) -> &[(String, String)] {
        self.data.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn data_attribute(&self, table: &str, column: &str) -> Option<&str> {
        self.data_columns(table)
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, attribute)| attribute.as_str())
    }

    /// Attribute standing for `column`, whether it stayed plain or became a relationship.
    pub fn attribute_for_column(&self, table: &str, column: &str) -> Option<&str> {
        self.data_attribute(table, column).or_else(|| {
            self.relationships
                .iter()
                .find(|r| r.source.table == table && r.column.as_deref() == Some(column))
                .map(|r| r.source.attribute.as_str())
        })
    }

    /// Relationship ends living on `table`, in discovery order.
    pub fn ends_on(&self, table: &str) -> Vec<(Side, &Relationship)> {
        let mut ends = Vec::new();
        for relationship in &self.relationships {
            if relationship.source.table == table {
                ends.push((Side::Source, relationship));
            }
            if relationship.target.table == table {
                ends.push((Side::Target, relationship));
            }
        }
        ends
    }

    /// Pony needs `reverse=` when a pair of entities is joined more than once, or onto itself.
    pub fn needs_reverse(&self, relationship: &Relationship) -> bool {
        relationship.is_self_referencing()
            || self
                .relationships
                .iter()
                .filter(|r| r.pair() == relationship.pair())
                .count()
                > 1
    }
}

// ============ Resolution ============

/// Turns foreign keys into relationships and names every generated attribute.
pub fn resolve(schema: &Schema, diagnostics: &mut Diagnostics) -> Resolution {
    let supported = classify(schema, diagnostics);
    let junctions = detect_junctions(schema, &supported, diagnostics);

    let mut namespaces: BTreeMap<String, Namespace> = BTreeMap::new();
    let mut data = BTreeMap::new();

    for table in schema.tables.values() {
        if junctions.contains_key(table.name.as_str()) {
            continue;
        }
        let relation_columns: BTreeSet<&str> = supported
            .get(table.name.as_str())
            .into_iter()
            .flatten()
            .filter_map(|fk| fk.column())
            .collect();

        let namespace = namespaces.entry(table.name.clone()).or_default();
        let mut columns = Vec::new();
        for column in table.ordered_columns() {
            if relation_columns.contains(column.name.as_str()) {
                continue;
            }
            let attribute = claim(namespace, &attribute_name(&column.name), &table.name, diagnostics);
            columns.push((column.name.clone(), attribute));
        }
        data.insert(table.name.clone(), columns);
    }

    let mut relationships = Vec::new();
    for table in schema.tables.values() {
        if let Some((first, second)) = junctions.get(table.name.as_str()) {
            relationships.push(many_to_many(table, first, second, &mut namespaces, diagnostics));
            continue;
        }
        for fk in supported.get(table.name.as_str()).into_iter().flatten() {
            if let Some(relationship) = foreign_key_relation(table, fk, &mut namespaces, diagnostics) {
                relationships.push(relationship);
            }
        }
    }

    debug!(
        "resolved {} relationships, {} junction tables",
        relationships.len(),
        junctions.len()
    );

    Resolution {
        relationships,
        junctions: junctions.keys().map(|t| t.to_string()).collect(),
        data,
    }
}

/// Keeps the foreign keys that can become relationships, in key order.
fn classify<'a>(schema: &'a Schema, diagnostics: &mut Diagnostics) -> BTreeMap<&'a str, Vec<&'a ForeignKey>> {
    let mut supported = BTreeMap::new();
    for table in schema.tables.values() {
        let mut used: BTreeSet<&str> = BTreeSet::new();
        let mut keys = Vec::new();
        for fk in &table.foreign_keys {
            match unsupported_reason(schema, fk, &used) {
                Some(detail) => diagnostics.push(Diagnostic::UnsupportedSchemaFeature {
                    table: table.name.clone(),
                    detail,
                }),
                None => {
                    if let Some(column) = fk.column() {
                        used.insert(column);
                    }
                    keys.push(fk);
                }
            }
        }
        supported.insert(table.name.as_str(), keys);
    }
    supported
}

fn unsupported_reason(schema: &Schema, fk: &ForeignKey, used: &BTreeSet<&str>) -> Option<String> {
    let (Some(column), Some(referenced)) = (fk.column(), fk.referenced_column()) else {
        return Some(format!(
            "composite foreign key ({}) -> {}({}) kept as plain columns",
            fk.columns.join(", "),
            fk.referenced_table,
            fk.referenced_columns.join(", ")
        ));
    };
    let Some(target) = schema.table(&fk.referenced_table) else {
        return Some(format!("foreign key `{}` points at unknown table `{}`", column, fk.referenced_table));
    };

    match target.primary_key.as_slice() {
        [pk] if pk == referenced => {
            if used.contains(column) {
                Some(format!(
                    "column `{}` carries more than one foreign key; the one onto `{}` is kept as a plain column",
                    column, target.name
                ))
            } else {
                None
            }
        }
        [_] | [] => Some(format!(
            "foreign key `{}` -> `{}.{}` does not reference the primary key; kept as a plain column",
            column, target.name, referenced
        )),
        _ => Some(format!(
            "foreign key `{}` -> `{}` references a composite primary key; kept as a plain column",
            column, target.name
        )),
    }
}

/// Junction tables: exactly two usable keys onto two distinct other tables, no
/// further columns, and nothing pointing back at them.
fn detect_junctions<'a>(
    schema: &'a Schema,
    supported: &BTreeMap<&'a str, Vec<&'a ForeignKey>>,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<&'a str, (&'a ForeignKey, &'a ForeignKey)> {
    let mut junctions = BTreeMap::new();

    for table in schema.tables.values() {
        let Some([first, second]) = supported.get(table.name.as_str()).map(Vec::as_slice) else {
            continue;
        };
        if table.foreign_keys.len() != 2
            || first.referenced_table == second.referenced_table
            || first.referenced_table == table.name
            || second.referenced_table == table.name
            || schema.references_to(&table.name) > 0
        {
            continue;
        }

        let key_columns: BTreeSet<&str> = first.column().into_iter().chain(second.column()).collect();
        let key_only_pk = table.primary_key.iter().all(|c| key_columns.contains(c.as_str()));
        let has_extra_columns = table.columns.iter().any(|c| !key_columns.contains(c.name.as_str()));

        if !key_only_pk {
            continue;
        }
        if has_extra_columns {
            diagnostics.push(Diagnostic::UnsupportedSchemaFeature {
                table: table.name.clone(),
                detail: format!(
                    "links `{}` and `{}` but carries extra columns; generated as an intermediary entity instead of many-to-many",
                    first.referenced_table, second.referenced_table
                ),
            });
            continue;
        }

        debug!(
            "`{}` is a junction between `{}` and `{}`",
            table.name, first.referenced_table, second.referenced_table
        );
        junctions.insert(table.name.as_str(), (*first, *second));
    }

    junctions
}

fn foreign_key_relation(
    table: &Table,
    fk: &ForeignKey,
    namespaces: &mut BTreeMap<String, Namespace>,
    diagnostics: &mut Diagnostics,
) -> Option<Relationship> {
    let column = fk.column()?;
    let target = &fk.referenced_table;
    let self_referencing = *target == table.name;
    let kind = if table.is_unique_column(column) {
        RelationKind::OneToOne
    } else {
        RelationKind::ManyToOne
    };

    let source_base = if self_referencing {
        self_reference_name(column, &table.name)
    } else {
        singular_attribute(target)
    };
    let target_base = match kind {
        RelationKind::OneToOne => singular_attribute(&table.name),
        _ => plural_attribute(&table.name),
    };

    let source_attribute = claim_relation(
        namespaces.entry(table.name.clone()).or_default(),
        &source_base,
        column,
        &table.name,
        diagnostics,
    );
    let target_attribute = claim_relation(
        namespaces.entry(target.clone()).or_default(),
        &target_base,
        column,
        target,
        diagnostics,
    );

    Some(Relationship {
        kind,
        source: RelationEnd {
            table: table.name.clone(),
            attribute: source_attribute,
        },
        target: RelationEnd {
            table: target.clone(),
            attribute: target_attribute,
        },
        column: Some(column.to_string()),
        required: table.column(column).is_some_and(|c| !c.is_nullable),
        junction: None,
    })
}

fn many_to_many(
    junction: &Table,
    first: &ForeignKey,
    second: &ForeignKey,
    namespaces: &mut BTreeMap<String, Namespace>,
    diagnostics: &mut Diagnostics,
) -> Relationship {
    let first_column = first.column().unwrap_or_default();
    let second_column = second.column().unwrap_or_default();
    let (a, b) = (&first.referenced_table, &second.referenced_table);

    let a_attribute = claim_relation(
        namespaces.entry(a.clone()).or_default(),
        &plural_attribute(b),
        second_column,
        a,
        diagnostics,
    );
    let b_attribute = claim_relation(
        namespaces.entry(b.clone()).or_default(),
        &plural_attribute(a),
        first_column,
        b,
        diagnostics,
    );

    Relationship {
        kind: RelationKind::ManyToMany,
        source: RelationEnd {
            table: a.clone(),
            attribute: a_attribute,
        },
        target: RelationEnd {
            table: b.clone(),
            attribute: b_attribute,
        },
        column: None,
        required: false,
        junction: Some(Junction {
            table: junction.name.clone(),
            source_column: first_column.to_string(),
            target_column: second_column.to_string(),
        }),
    }
}

/// `parent_id` on a self-referencing key names the role `parent`.
fn self_reference_name(column: &str, table: &str) -> String {
    let lowered = column.to_lowercase();
    let stem = lowered
        .strip_suffix("_id")
        .or_else(|| lowered.strip_suffix("id"))
        .unwrap_or(&lowered)
        .trim_end_matches('_');
    if stem.is_empty() {
        singular_attribute(table)
    } else {
        attribute_name(stem)
    }
}

fn claim(namespace: &mut Namespace, requested: &str, table: &str, diagnostics: &mut Diagnostics) -> String {
    let resolved = namespace.claim(requested);
    if resolved != requested {
        diagnostics.push(Diagnostic::NamingCollision {
            scope: format!("table `{}`", table),
            requested: requested.to_string(),
            resolved: resolved.clone(),
        });
    }
    resolved
}

/// Relationship names fall back to `<name>_<fk column>` before numbering.
fn claim_relation(
    namespace: &mut Namespace,
    requested: &str,
    column: &str,
    table: &str,
    diagnostics: &mut Diagnostics,
) -> String {
    if namespace.try_claim(requested) {
        return requested.to_string();
    }
    let resolved = namespace.claim(&format!("{}_{}", requested, attribute_name(column)));
    diagnostics.push(Diagnostic::NamingCollision {
        scope: format!("table `{}`", table),
        requested: requested.to_string(),
        resolved: resolved.clone(),
    });
    resolved
}
