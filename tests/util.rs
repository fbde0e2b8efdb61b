#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use choreboard_lib::household::{create_household, join_household, JoinCodePolicy};
use choreboard_lib::{members, migrate, Household, Member, SqliteStore};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

/// In-memory SQLite store with the schema applied.
pub async fn migrated_store() -> SqliteStore {
    let pool = temp_pool().await;
    migrate::apply_migrations(&pool)
        .await
        .expect("apply migrations");
    SqliteStore::new(pool)
}

pub async fn member(store: &SqliteStore, name: &str) -> Member {
    members::register(store, name, &format!("{}@example.com", name.to_lowercase()))
        .await
        .expect("register member")
}

/// A household created by `name`, returned with its creator.
pub async fn household_with_creator(store: &SqliteStore, name: &str) -> (Household, Member) {
    let mut creator = member(store, name).await;
    let household = create_household(
        store,
        &format!("{name}'s flat"),
        "shared-flat",
        &mut creator,
        &JoinCodePolicy::default(),
    )
    .await
    .expect("create household");
    (household, creator)
}

pub async fn joined(store: &SqliteStore, household: &Household, name: &str) -> Member {
    let mut joiner = member(store, name).await;
    join_household(store, &household.code, &mut joiner)
        .await
        .expect("join household");
    joiner
}
