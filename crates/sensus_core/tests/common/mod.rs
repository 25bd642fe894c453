#![allow(dead_code)]

use rusqlite::Row;
use sensus_core::{
    ColumnDef, ColumnType, Entity, EntityDescriptor, KeyStrategy, ProviderConfig, SessionFactory,
    Value,
};
use std::sync::Arc;
use tempfile::TempDir;

pub const PEOPLE_SCHEMA: &str = "CREATE TABLE people (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    surname TEXT NOT NULL,
    age INTEGER NOT NULL
);";

static PERSON: EntityDescriptor = EntityDescriptor {
    name: "person",
    table: "people",
    primary_key: ColumnDef::new("id", "id", ColumnType::Integer),
    key_strategy: KeyStrategy::Generated,
    columns: &[
        ColumnDef::new("name", "first_name", ColumnType::Text).not_null(),
        ColumnDef::new("surname", "surname", ColumnType::Text).not_null(),
        ColumnDef::new("age", "age", ColumnType::Integer).not_null(),
    ],
};

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub surname: String,
    pub age: i64,
}

impl Person {
    pub fn new(name: &str, surname: &str, age: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            surname: surname.to_string(),
            age,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl Entity for Person {
    fn descriptor() -> &'static EntityDescriptor {
        &PERSON
    }

    fn primary_key(&self) -> Option<Value> {
        self.id.map(Value::Integer)
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.surname.clone().into(),
            self.age.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("first_name")?,
            surname: row.get("surname")?,
            age: row.get("age")?,
        })
    }

    fn assign_generated_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

static TAG: EntityDescriptor = EntityDescriptor {
    name: "tag",
    table: "tags",
    primary_key: ColumnDef::new("code", "code", ColumnType::Text),
    key_strategy: KeyStrategy::Assigned,
    columns: &[ColumnDef::new("label", "label", ColumnType::LongVarChar)],
};

/// Entity with a caller-assigned text key; its table is created on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub code: Option<String>,
    pub label: String,
}

impl Entity for Tag {
    fn descriptor() -> &'static EntityDescriptor {
        &TAG
    }

    fn primary_key(&self) -> Option<Value> {
        self.code.clone().map(Value::Text)
    }

    fn column_values(&self) -> Vec<Value> {
        vec![self.label.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get("code")?,
            label: row.get("label")?,
        })
    }
}

pub fn config_in(dir: &TempDir) -> ProviderConfig {
    ProviderConfig::new(dir.path().join("sensus.db")).with_schema_sql(1, PEOPLE_SCHEMA)
}

/// Fresh database with the `people` table; keep the dir alive for the test.
pub fn test_factory() -> (TempDir, Arc<SessionFactory>) {
    let dir = tempfile::tempdir().unwrap();
    let factory = SessionFactory::build(config_in(&dir)).unwrap();
    (dir, factory)
}

pub fn seed_people() -> Vec<Person> {
    vec![
        Person::new("Anna", "Smithson", 34),
        Person::new("Bruno", "Blacksmith", 51),
        Person::new("Carla", "smith", 18),
        Person::new("Dario", "Rossi", 65),
        Person::new("Elena", "Bianchi", 27),
        Person::new("Fabio", "Smith", 42),
        Person::new("Giulia", "Verdi", 17),
    ]
}
