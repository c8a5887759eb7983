use ponygen_capabilities::{
    Diagnostic, ReadOptions, SchemaRead, SqliteReader, TomlSchema, generate, read_schema,
};
use ponygen_config::Provider;
use pretty_assertions::assert_eq;
use sqlx::sqlite::SqlitePoolOptions;

const LIBRARY: &str = r#"
    CREATE TABLE author (
        id INTEGER PRIMARY KEY,
        name VARCHAR(100) NOT NULL
    );
    CREATE TABLE book (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        author_id INTEGER NOT NULL REFERENCES author (id)
    );
"#;

const SCHOOL: &str = r#"
    CREATE TABLE student (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE course (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
    CREATE TABLE enrollment (
        student_id INTEGER NOT NULL REFERENCES student (id),
        course_id INTEGER NOT NULL REFERENCES course (id),
        PRIMARY KEY (student_id, course_id)
    );
"#;

const STORAGE: &str = r#"
    CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE shelf (
        room INTEGER NOT NULL,
        slot INTEGER NOT NULL,
        label TEXT DEFAULT 'spare',
        PRIMARY KEY (room, slot)
    );
    CREATE TABLE box (
        id INTEGER PRIMARY KEY,
        owner_id INTEGER REFERENCES person,
        room INTEGER,
        slot INTEGER,
        code VARCHAR(12) NOT NULL UNIQUE,
        FOREIGN KEY (room, slot) REFERENCES shelf (room, slot)
    );
    CREATE INDEX box_room_slot ON box (room, slot);
"#;

async fn reader(ddl: &str) -> SqliteReader {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory database");
    sqlx::raw_sql(ddl).execute(&pool).await.expect("apply ddl");
    SqliteReader::new(pool)
}

async fn read(ddl: &str, options: &ReadOptions) -> SchemaRead {
    read_schema(&reader(ddl).await, options).await.expect("read schema")
}

#[tokio::test]
async fn generates_author_and_book_entities() {
    let read = read(LIBRARY, &ReadOptions::default()).await;
    let generated = generate(&read.schema).expect("generate");

    let expected = r#"# This is an auto-generated module with Pony ORM entities.

from pony.orm import Database, LongStr, PrimaryKey, Required, Set

db = Database()


class Author(db.Entity):
    _table_ = "author"
    id = PrimaryKey(int, auto=True)
    name = Required(str, max_len=100)
    books = Set("Book")


class Book(db.Entity):
    _table_ = "book"
    id = PrimaryKey(int, auto=True)
    title = Required(LongStr)
    author = Required("Author", column="author_id")
"#;
    assert_eq!(generated.source, expected);
    assert!(read.diagnostics.is_empty());
    assert!(generated.diagnostics.is_empty());
}

#[tokio::test]
async fn junction_tables_become_many_to_many() {
    let read = read(SCHOOL, &ReadOptions::default()).await;
    let generated = generate(&read.schema).expect("generate");

    let classes: Vec<&str> = generated.models.iter().map(|m| m.class_name.as_str()).collect();
    assert_eq!(classes, vec!["Course", "Student"]);
    assert!(!generated.source.contains("Enrollment"));
    assert!(
        generated
            .source
            .contains(r#"    courses = Set("Course", column="course_id", table="enrollment")"#)
    );
    assert!(
        generated
            .source
            .contains(r#"    students = Set("Student", column="student_id", table="enrollment")"#)
    );
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let first = generate(&read(STORAGE, &ReadOptions::default()).await.schema).expect("first");
    let second = generate(&read(STORAGE, &ReadOptions::default()).await.schema).expect("second");
    assert_eq!(first.source, second.source);
}

#[tokio::test]
async fn reads_keys_indexes_and_defaults() {
    let read = read(STORAGE, &ReadOptions::default()).await;
    let schema = &read.schema;

    let shelf = schema.table("shelf").expect("shelf");
    assert_eq!(shelf.primary_key, vec!["room", "slot"]);
    assert!(!shelf.columns[0].auto_increment);
    assert_eq!(shelf.column("label").and_then(|c| c.default.as_deref()), Some("'spare'"));

    let boxes = schema.table("box").expect("box");
    assert!(boxes.columns[0].auto_increment);
    assert!(!boxes.columns[0].is_nullable);
    let keys: Vec<(Vec<String>, &str, Vec<String>)> = boxes
        .foreign_keys
        .iter()
        .map(|fk| (fk.columns.clone(), fk.referenced_table.as_str(), fk.referenced_columns.clone()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (vec!["owner_id".to_string()], "person", vec!["id".to_string()]),
            (
                vec!["room".to_string(), "slot".to_string()],
                "shelf",
                vec!["room".to_string(), "slot".to_string()]
            ),
        ]
    );
    assert!(boxes.is_unique_column("code"));
    assert!(
        boxes
            .indexes
            .iter()
            .any(|i| i.name == "box_room_slot" && i.columns == ["room", "slot"] && !i.is_unique)
    );

    let generated = generate(schema).expect("generate");
    let source = &generated.source;
    assert!(source.contains(r#"    owner = Optional("Person", column="owner_id")"#));
    assert!(source.contains("    code = Required(str, max_len=12, unique=True)"));
    assert!(source.contains("    room = Optional(int, nullable=True)"));
    assert!(source.contains("    composite_index(room, slot)"));
    assert!(source.contains("    PrimaryKey(room, slot)"));
    assert!(source.contains(r#"    label = Optional(LongStr, nullable=True, sql_default="'spare'")"#));
    assert!(generated.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnsupportedSchemaFeature { table, .. } if table == "box"
    )));
}

#[tokio::test]
async fn excluded_tables_drop_their_references() {
    let read = read(STORAGE, &ReadOptions::excluding(["person"])).await;

    assert!(read.schema.table("person").is_none());
    assert!(read.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnsupportedSchemaFeature { detail, .. } if detail.contains("person")
    )));

    let generated = generate(&read.schema).expect("generate");
    assert!(generated.source.contains("    owner_id = Optional(int, nullable=True)"));
    assert!(!generated.source.contains("class Person"));
}

#[tokio::test]
async fn unknown_types_do_not_block_generation() {
    let ddl = r#"
        CREATE TABLE place (id INTEGER PRIMARY KEY, shape GEOMETRY NOT NULL, name TEXT NOT NULL);
        CREATE TABLE visit (id INTEGER PRIMARY KEY, place_id INTEGER NOT NULL REFERENCES place (id));
    "#;
    let read = read(ddl, &ReadOptions::default()).await;
    let generated = generate(&read.schema).expect("generate");

    assert_eq!(generated.models.len(), 2);
    assert!(generated.source.contains("    shape = Required(LongStr)"));
    assert!(generated.source.contains(r#"    place = Required("Place", column="place_id")"#));
    assert!(generated.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnknownType { column, .. } if column == "shape"
    )));
}

#[tokio::test]
async fn snapshot_generates_the_same_source() {
    let read = read(STORAGE, &ReadOptions::default()).await;
    let live = generate(&read.schema).expect("generate live");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("schema").join("schema.toml");
    TomlSchema::from_schema(&read.schema, Some(Provider::Sqlite))
        .write_file(&path)
        .expect("write snapshot");

    let snapshot = TomlSchema::from_file(&path).expect("read snapshot");
    assert_eq!(snapshot.provider, Some(Provider::Sqlite));
    let offline = generate(&snapshot.into_schema()).expect("generate offline");

    assert_eq!(offline.source, live.source);
}
