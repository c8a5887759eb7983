use std::collections::BTreeSet;

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def",
    "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Names bound at module level by the generated header.
const MODULE_NAMES: &[&str] = &[
    "db", "Database", "Optional", "PrimaryKey", "Required", "Set", "LongStr", "Json", "IntArray",
    "StrArray", "FloatArray", "composite_key", "composite_index", "Decimal", "UUID", "date", "datetime",
    "time", "timedelta",
];

/// Lower-case names the generated class bodies read after declaring
/// attributes. Binding one of them as an attribute shadows it for the rest of
/// the class.
const CLASS_BODY_NAMES: &[&str] = &[
    "int", "str", "float", "bool", "bytes", "date", "datetime", "time", "timedelta", "composite_key",
    "composite_index",
];

pub fn is_keyword(ident: &str) -> bool {
    PYTHON_KEYWORDS.contains(&ident)
}

fn is_reserved_attribute(ident: &str) -> bool {
    is_keyword(ident) || CLASS_BODY_NAMES.contains(&ident)
}

/// Turns a column name into a Python attribute name.
pub fn attribute_name(column: &str) -> String {
    let mut name: String = column
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        name.push_str("attr");
    }
    if name.starts_with('_') {
        name.insert_str(0, "attr");
    }
    if name.ends_with('_') {
        name.push_str("attr");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "number_");
    }
    if is_reserved_attribute(&name) {
        name.push_str("_attr");
    }
    name
}

/// Turns a table name into a TitleCase class name.
pub fn class_name(table: &str) -> String {
    let mut name: String = table
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect();

    if name.is_empty() {
        name.push_str("Table");
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert(0, '_');
    }
    if is_keyword(&name) || MODULE_NAMES.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

pub fn pluralize(word: &str) -> String {
    let ends_with_consonant_y = word.ends_with('y')
        && !word[..word.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);

    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        format!("{}es", word)
    } else if ends_with_consonant_y && word.len() > 1 {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{}s", word)
    }
}

pub fn singularize(word: &str) -> String {
    if word.len() > 3 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if ["sses", "shes", "ches", "xes", "zes"].iter().any(|suffix| word.ends_with(suffix)) {
        word[..word.len() - 2].to_string()
    } else if ["ss", "us", "is"].iter().any(|suffix| word.ends_with(suffix)) {
        word.to_string()
    } else if word.len() > 1 && word.ends_with('s') {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Attribute name for the side of a relationship holding one `table` row.
pub fn singular_attribute(table: &str) -> String {
    attribute_name(&singularize(&table.to_lowercase()))
}

/// Attribute name for the side of a relationship holding many `table` rows.
pub fn plural_attribute(table: &str) -> String {
    attribute_name(&pluralize(&singularize(&table.to_lowercase())))
}

/// Identifiers already bound in one scope (a class body, or the module).
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    taken: BTreeSet<String>,
}

impl Namespace {
    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Binds `name` if it is free.
    pub fn try_claim(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_string())
    }

    /// Binds `name`, or the first free `name_N` with N from 2.
    pub fn claim(&mut self, name: &str) -> String {
        if self.try_claim(name) {
            return name.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", name, n);
            if self.try_claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitises_column_names() {
        assert_eq!(attribute_name("author_id"), "author_id");
        assert_eq!(attribute_name("FirstName"), "firstname");
        assert_eq!(attribute_name("unit price"), "unit_price");
        assert_eq!(attribute_name("_hidden"), "attr_hidden");
        assert_eq!(attribute_name("flag_"), "flag_attr");
        assert_eq!(attribute_name("2fa"), "number_2fa");
        assert_eq!(attribute_name("class"), "class_attr");
        assert_eq!(attribute_name("from"), "from_attr");
        assert_eq!(attribute_name("Date"), "date_attr");
        assert_eq!(attribute_name("time"), "time_attr");
        assert_eq!(attribute_name("str"), "str_attr");
        assert_eq!(attribute_name("composite_key"), "composite_key_attr");
        assert_eq!(attribute_name("dates"), "dates");
    }

    #[test]
    fn builds_class_names() {
        assert_eq!(class_name("author"), "Author");
        assert_eq!(class_name("order_line_item"), "OrderLineItem");
        assert_eq!(class_name("user-account"), "UserAccount");
        assert_eq!(class_name("2fa_codes"), "_2faCodes");
        assert_eq!(class_name("none"), "None_");
        assert_eq!(class_name("set"), "Set_");
        assert_eq!(class_name("__"), "Table");
    }

    #[test]
    fn inflects_table_names() {
        assert_eq!(pluralize("book"), "books");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("books"), "book");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("address"), "address");
        assert_eq!(plural_attribute("books"), "books");
        assert_eq!(plural_attribute("Person"), "persons");
        assert_eq!(singular_attribute("authors"), "author");
    }

    #[test]
    fn claims_numbered_fallbacks() {
        let mut ns = Namespace::default();
        assert_eq!(ns.claim("name"), "name");
        assert_eq!(ns.claim("name"), "name_2");
        assert_eq!(ns.claim("name"), "name_3");
        assert!(ns.contains("name_2"));
        assert!(!ns.try_claim("name"));
    }
}
