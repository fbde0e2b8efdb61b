//! Persistence capability consumed by the core.
//!
//! Records travel as JSON objects keyed by column name. Every predicate is a
//! conjunction of equality clauses; household scoping is the caller's job and
//! no adapter enforces it on its own.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Households,
    Users,
    Tasks,
    Purchases,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Households => "households",
            Collection::Users => "users",
            Collection::Tasks => "tasks",
            Collection::Purchases => "purchases",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Collection::Households => &["id", "name", "category", "code", "created_at"],
            Collection::Users => &["id", "name", "email", "household_id", "created_at"],
            Collection::Tasks => &[
                "id",
                "household_id",
                "title",
                "due_at",
                "points",
                "created_by",
                "completed",
                "completed_at",
                "created_at",
            ],
            Collection::Purchases => &[
                "id",
                "household_id",
                "item",
                "quantity",
                "completed",
                "completed_by",
                "completed_at",
                "created_at",
            ],
        }
    }

    /// Columns whose values may appear in at most one record.
    pub fn unique_columns(self) -> &'static [&'static str] {
        match self {
            Collection::Households => &["id", "code"],
            _ => &["id"],
        }
    }

    pub fn ensure_column(self, column: &str) -> Result<(), StoreError> {
        if self.columns().contains(&column) {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "unknown column {column} on {}",
                self.table()
            )))
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("store backend: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Backend(format!("record shape: {error}"))
    }
}

/// Conjunction of `column = value` clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push((column, value.into()));
        self
    }

    pub fn clauses(&self) -> &[(&'static str, Value)] {
        &self.clauses
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses
            .iter()
            .all(|(column, expected)| record.get(*column).unwrap_or(&Value::Null) == expected)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Records matching `filter`, in insertion order.
    async fn select_where(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Record>, StoreError>;

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record, StoreError>;

    /// Applies `patch` to every record matching `filter` in one write and returns
    /// the records as they are after the write.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError>;

    /// Removes every record matching `filter` and returns how many were removed.
    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    async fn select_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Record, StoreError> {
        self.select_where(collection, filter)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound)
    }
}

pub fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected an object record, got {other}"
        ))),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_all_clauses() {
        let record = to_record(&json!({ "id": "t1", "household_id": "h1", "completed": false }))
            .unwrap();
        assert!(Filter::new().matches(&record));
        assert!(Filter::new()
            .eq("id", "t1")
            .eq("household_id", "h1")
            .eq("completed", false)
            .matches(&record));
        assert!(!Filter::new().eq("household_id", "h2").matches(&record));
        assert!(!Filter::new().eq("missing", "x").matches(&record));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        assert!(Collection::Tasks.ensure_column("points").is_ok());
        assert!(matches!(
            Collection::Tasks.ensure_column("points; DROP TABLE tasks"),
            Err(StoreError::Backend(_))
        ));
    }
}
