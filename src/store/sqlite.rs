use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use super::{Collection, Filter, Record, Store, StoreError};

/// Store backed by the SQLite schema in `migrations/`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

fn row_to_record(row: &SqliteRow) -> Record {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let val = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => Value::Null,
            Ok(raw) => match raw.type_info().name() {
                "INTEGER" => row
                    .try_get::<i64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "REAL" => row
                    .try_get::<f64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                _ => row
                    .try_get::<String, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            },
            Err(_) => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    map
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn where_clause(collection: Collection, filter: &Filter) -> Result<String, StoreError> {
    if filter.clauses().is_empty() {
        return Ok(String::from("1 = 1"));
    }
    let parts = filter
        .clauses()
        .iter()
        .map(|(column, _)| {
            collection.ensure_column(column)?;
            Ok(format!("{column} = ?"))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    Ok(parts.join(" AND "))
}

#[async_trait]
impl Store for SqliteStore {
    async fn select_where(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} ORDER BY rowid",
            collection.table(),
            where_clause(collection, filter)?
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in filter.clauses() {
            query = bind_value(query, value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        let cols: Vec<&String> = record.keys().collect();
        for col in &cols {
            collection.ensure_column(col)?;
        }
        let placeholders: Vec<&str> = cols.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            collection.table(),
            cols.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","),
            placeholders.join(",")
        );
        let mut query = sqlx::query(&sql);
        for value in record.values() {
            query = bind_value(query, value);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row_to_record(&row))
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        if patch.is_empty() {
            return self.select_where(collection, filter).await;
        }
        let set_clause = patch
            .keys()
            .map(|col| {
                collection.ensure_column(col)?;
                Ok(format!("{col} = ?"))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURNING *",
            collection.table(),
            set_clause.join(","),
            where_clause(collection, filter)?
        );
        let mut query = sqlx::query(&sql);
        for value in patch.values() {
            query = bind_value(query, value);
        }
        for (_, value) in filter.clauses() {
            query = bind_value(query, value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            collection.table(),
            where_clause(collection, filter)?
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in filter.clauses() {
            query = bind_value(query, value);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
