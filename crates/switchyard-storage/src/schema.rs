//! Schema bootstrap and pool creation.
//!
//! Tables are created idempotently at startup. Child rows are ordered by
//! their `id`, so insertion order is pipeline and argument order.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::error::StorageResult;

const TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS relay (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT    NOT NULL COLLATE NOCASE UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS relay_layer (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        relay_id INTEGER NOT NULL REFERENCES relay(id),
        layer    TEXT    NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS relay_layer_argument (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        layer_id INTEGER NOT NULL REFERENCES relay_layer(id),
        name     TEXT    NOT NULL,
        value    TEXT    NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS route (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        source      TEXT    NOT NULL,
        destination TEXT    NOT NULL,
        two_way     BOOLEAN NOT NULL DEFAULT FALSE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS route_modifier (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        route_id INTEGER NOT NULL REFERENCES route(id),
        modifier TEXT    NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS route_modifier_argument (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        route_modifier_id INTEGER NOT NULL REFERENCES route_modifier(id),
        name              TEXT    NOT NULL,
        value             TEXT    NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS route_hop_color (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        hop        TEXT    NOT NULL,
        "where"    TEXT,
        tag_color  TEXT,
        text_color TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS route_hop_format (
        id     INTEGER PRIMARY KEY AUTOINCREMENT,
        hop    TEXT    NOT NULL,
        format TEXT    NOT NULL,
        render BOOLEAN NOT NULL DEFAULT TRUE
    )"#,
];

/// Creates all tables that do not exist yet.
pub async fn bootstrap(pool: &SqlitePool) -> StorageResult<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(tables = TABLES.len(), "Database schema ready");
    Ok(())
}

/// Opens a pool for `url` with foreign keys enforced.
pub async fn connect(url: &str, max_connections: u32) -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// A single-connection in-memory pool with the schema in place.
///
/// In-memory SQLite databases are per connection, so the pool must never
/// open a second one.
pub async fn memory() -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    bootstrap(&pool).await?;
    Ok(pool)
}
