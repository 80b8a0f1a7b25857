//! Relay configuration rows.
//!
//! A relay is stored as one `relay` row, its stack as ordered `relay_layer`
//! rows and each layer's arguments as ordered `relay_layer_argument` rows.

use sqlx::{SqliteConnection, SqlitePool};
use switchyard_core::{LayerArgument, RelayConfig, RelayLayer};

use crate::error::StorageResult;

#[derive(sqlx::FromRow)]
struct RelayRow {
    id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct LayerRow {
    id: i64,
    layer: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ArgumentRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) value: String,
}

impl From<ArgumentRow> for LayerArgument {
    fn from(r: ArgumentRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            value: r.value,
        }
    }
}

/// Number of rows in each relay table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayRowCounts {
    pub relays: i64,
    pub layers: i64,
    pub arguments: i64,
}

/// SQLite-backed relay configuration store.
#[derive(Debug, Clone)]
pub struct RelayRepository {
    pool: SqlitePool,
}

impl RelayRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All relays with their layers and arguments, ordered by id.
    pub async fn list(&self) -> StorageResult<Vec<RelayConfig>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, RelayRow>("SELECT id, name FROM relay ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        let mut relays = Vec::with_capacity(rows.len());
        for row in rows {
            relays.push(complete(&mut conn, row).await?);
        }
        Ok(relays)
    }

    pub async fn get(&self, id: i64) -> StorageResult<Option<RelayConfig>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, RelayRow>("SELECT id, name FROM relay WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(complete(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_name(&self, name: &str) -> StorageResult<Option<RelayConfig>> {
        let mut conn = self.pool.acquire().await?;
        find_by_name(&mut conn, name).await
    }

    pub async fn row_counts(&self) -> StorageResult<RelayRowCounts> {
        let (relays, layers, arguments): (i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                (SELECT COUNT(*) FROM relay),
                (SELECT COUNT(*) FROM relay_layer),
                (SELECT COUNT(*) FROM relay_layer_argument)"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(RelayRowCounts {
            relays,
            layers,
            arguments,
        })
    }
}

/// Looks a relay up by name, ignoring case, on an open connection or
/// transaction.
pub async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> StorageResult<Option<RelayConfig>> {
    let row = sqlx::query_as::<_, RelayRow>("SELECT id, name FROM relay WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(complete(conn, row).await?)),
        None => Ok(None),
    }
}

/// Writes a relay with all its layers and arguments and returns it with ids
/// filled in. Call inside a transaction.
pub async fn insert(conn: &mut SqliteConnection, config: &RelayConfig) -> StorageResult<RelayConfig> {
    let relay_id = sqlx::query("INSERT INTO relay (name) VALUES (?)")
        .bind(&config.name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let mut stored = RelayConfig {
        id: relay_id,
        name: config.name.clone(),
        layers: Vec::with_capacity(config.layers.len()),
    };
    for layer in &config.layers {
        let layer_id = sqlx::query("INSERT INTO relay_layer (relay_id, layer) VALUES (?, ?)")
            .bind(relay_id)
            .bind(&layer.name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

        let mut stored_layer = RelayLayer {
            id: layer_id,
            name: layer.name.clone(),
            arguments: Vec::with_capacity(layer.arguments.len()),
        };
        for arg in &layer.arguments {
            let arg_id = sqlx::query(
                "INSERT INTO relay_layer_argument (layer_id, name, value) VALUES (?, ?, ?)",
            )
            .bind(layer_id)
            .bind(&arg.name)
            .bind(&arg.value)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
            stored_layer.arguments.push(LayerArgument {
                id: arg_id,
                name: arg.name.clone(),
                value: arg.value.clone(),
            });
        }
        stored.layers.push(stored_layer);
    }
    Ok(stored)
}

/// Deletes arguments, then layers, then the relay row. Returns `false` if no
/// relay with that id existed. Call inside a transaction.
pub async fn delete(conn: &mut SqliteConnection, relay_id: i64) -> StorageResult<bool> {
    sqlx::query(
        "DELETE FROM relay_layer_argument
         WHERE layer_id IN (SELECT id FROM relay_layer WHERE relay_id = ?)",
    )
    .bind(relay_id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM relay_layer WHERE relay_id = ?")
        .bind(relay_id)
        .execute(&mut *conn)
        .await?;
    let deleted = sqlx::query("DELETE FROM relay WHERE id = ?")
        .bind(relay_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

async fn complete(conn: &mut SqliteConnection, row: RelayRow) -> StorageResult<RelayConfig> {
    let layer_rows = sqlx::query_as::<_, LayerRow>(
        "SELECT id, layer FROM relay_layer WHERE relay_id = ? ORDER BY id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut layers = Vec::with_capacity(layer_rows.len());
    for layer in layer_rows {
        let arguments = sqlx::query_as::<_, ArgumentRow>(
            "SELECT id, name, value FROM relay_layer_argument WHERE layer_id = ? ORDER BY id",
        )
        .bind(layer.id)
        .fetch_all(&mut *conn)
        .await?;
        layers.push(RelayLayer {
            id: layer.id,
            name: layer.layer,
            arguments: arguments.into_iter().map(Into::into).collect(),
        });
    }
    Ok(RelayConfig {
        id: row.id,
        name: row.name,
        layers,
    })
}
