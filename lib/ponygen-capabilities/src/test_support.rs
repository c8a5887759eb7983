use crate::schema::{Column, ForeignKey, Index, NativeType, Schema, Table};

/// Fluent table fixture; columns are NOT NULL unless added with `nullable`.
pub(crate) struct TableBuilder(Table);

impl TableBuilder {
    pub(crate) fn new(name: &str) -> Self {
        TableBuilder(Table {
            name: name.into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        })
    }

    /// `id INTEGER PRIMARY KEY` with auto-increment.
    pub(crate) fn entity(name: &str) -> Self {
        Self::new(name).column("id", "INTEGER").primary_key(&["id"]).auto("id")
    }

    pub(crate) fn column(self, name: &str, declared: &str) -> Self {
        self.push_column(name, declared, false)
    }

    pub(crate) fn nullable(self, name: &str, declared: &str) -> Self {
        self.push_column(name, declared, true)
    }

    fn push_column(mut self, name: &str, declared: &str, is_nullable: bool) -> Self {
        let ordinal = self.0.columns.len() as u32 + 1;
        self.0.columns.push(Column {
            name: name.into(),
            native_type: NativeType::parse_declared(declared),
            is_nullable,
            default: None,
            ordinal,
            auto_increment: false,
        });
        self
    }

    pub(crate) fn with_default(mut self, column: &str, value: &str) -> Self {
        if let Some(c) = self.0.columns.iter_mut().find(|c| c.name == column) {
            c.default = Some(value.into());
        }
        self
    }

    pub(crate) fn auto(mut self, column: &str) -> Self {
        if let Some(c) = self.0.columns.iter_mut().find(|c| c.name == column) {
            c.auto_increment = true;
        }
        self
    }

    pub(crate) fn primary_key(mut self, columns: &[&str]) -> Self {
        self.0.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Single-column key onto `target.id`.
    pub(crate) fn foreign_key(self, column: &str, target: &str) -> Self {
        self.foreign_key_to(&[column], target, &["id"])
    }

    pub(crate) fn foreign_key_to(mut self, columns: &[&str], target: &str, referenced: &[&str]) -> Self {
        self.0.foreign_keys.push(ForeignKey {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_table: target.into(),
            referenced_columns: referenced.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub(crate) fn unique(self, columns: &[&str]) -> Self {
        self.push_index(columns, true)
    }

    pub(crate) fn index(self, columns: &[&str]) -> Self {
        self.push_index(columns, false)
    }

    fn push_index(mut self, columns: &[&str], is_unique: bool) -> Self {
        self.0.indexes.push(Index {
            name: format!("{}_{}_idx", self.0.name, columns.join("_")),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            is_unique,
            index_type: "btree".into(),
        });
        self
    }

    pub(crate) fn build(self) -> Table {
        self.0
    }
}

pub(crate) fn schema(tables: impl IntoIterator<Item = TableBuilder>) -> Schema {
    Schema::from_tables(tables.into_iter().map(TableBuilder::build))
}
