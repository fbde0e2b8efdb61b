use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Collection, Filter, Record, Store, StoreError};

/// Process-local store. Each write runs under a single lock, so an update's
/// filter check and patch are applied together.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<Collection, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_data<R>(
        &self,
        f: impl FnOnce(&mut HashMap<Collection, Vec<Record>>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        f(&mut guard)
    }
}

fn check_columns(collection: Collection, record: &Record) -> Result<(), StoreError> {
    record
        .keys()
        .try_for_each(|column| collection.ensure_column(column))
}

fn check_unique(
    collection: Collection,
    rows: &[Record],
    candidate: &Record,
    skip: Option<usize>,
) -> Result<(), StoreError> {
    for column in collection.unique_columns() {
        let Some(value) = candidate.get(*column).filter(|v| !v.is_null()) else {
            continue;
        };
        let clash = rows
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != skip)
            .any(|(_, row)| row.get(*column) == Some(value));
        if clash {
            return Err(StoreError::Conflict(format!(
                "{}.{column} already holds {value}",
                collection.table()
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn select_where(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Record>, StoreError> {
        for (column, _) in filter.clauses() {
            collection.ensure_column(column)?;
        }
        self.with_data(|data| {
            Ok(data
                .get(&collection)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| filter.matches(row))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        check_columns(collection, &record)?;
        self.with_data(|data| {
            let rows = data.entry(collection).or_default();
            check_unique(collection, rows, &record, None)?;
            let mut stored = record;
            for column in collection.columns() {
                stored.entry(column.to_string()).or_insert(Value::Null);
            }
            rows.push(stored.clone());
            Ok(stored)
        })
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        check_columns(collection, &patch)?;
        for (column, _) in filter.clauses() {
            collection.ensure_column(column)?;
        }
        self.with_data(|data| {
            let Some(rows) = data.get_mut(&collection) else {
                return Ok(Vec::new());
            };
            let targets: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, row)| filter.matches(row))
                .map(|(idx, _)| idx)
                .collect();

            let mut patched = Vec::with_capacity(targets.len());
            for idx in &targets {
                let mut next = rows[*idx].clone();
                next.extend(patch.clone());
                check_unique(collection, rows, &next, Some(*idx))?;
                patched.push(next);
            }
            for (idx, next) in targets.iter().zip(&patched) {
                rows[*idx] = next.clone();
            }
            Ok(patched)
        })
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        for (column, _) in filter.clauses() {
            collection.ensure_column(column)?;
        }
        self.with_data(|data| {
            let Some(rows) = data.get_mut(&collection) else {
                return Ok(0);
            };
            let before = rows.len();
            rows.retain(|row| !filter.matches(row));
            Ok((before - rows.len()) as u64)
        })
    }
}
