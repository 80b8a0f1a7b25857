//! Route rows.

use sqlx::{SqliteConnection, SqlitePool};
use switchyard_core::{RouteModifierRecord, RouteRecord};

use crate::error::StorageResult;
use crate::relay::ArgumentRow;

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: i64,
    source: String,
    destination: String,
    two_way: bool,
}

#[derive(sqlx::FromRow)]
struct ModifierRow {
    id: i64,
    modifier: String,
}

/// SQLite-backed route store.
#[derive(Debug, Clone)]
pub struct RouteRepository {
    pool: SqlitePool,
}

impl RouteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All routes with their modifiers, ordered by id.
    pub async fn list(&self) -> StorageResult<Vec<RouteRecord>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT id, source, destination, two_way FROM route ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;
        let mut routes = Vec::with_capacity(rows.len());
        for row in rows {
            routes.push(complete(&mut conn, row).await?);
        }
        Ok(routes)
    }

    pub async fn get(&self, id: i64) -> StorageResult<Option<RouteRecord>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, source, destination, two_way FROM route WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        match row {
            Some(row) => Ok(Some(complete(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM route")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Writes a route with its modifiers and their arguments. Call inside a
/// transaction.
pub async fn insert(conn: &mut SqliteConnection, route: &RouteRecord) -> StorageResult<RouteRecord> {
    let route_id =
        sqlx::query("INSERT INTO route (source, destination, two_way) VALUES (?, ?, ?)")
            .bind(&route.source)
            .bind(&route.destination)
            .bind(route.two_way)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

    let mut stored = RouteRecord {
        id: route_id,
        modifiers: Vec::with_capacity(route.modifiers.len()),
        ..route.clone()
    };
    for modifier in &route.modifiers {
        let modifier_id =
            sqlx::query("INSERT INTO route_modifier (route_id, modifier) VALUES (?, ?)")
                .bind(route_id)
                .bind(&modifier.modifier)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();
        let mut stored_modifier = RouteModifierRecord {
            id: modifier_id,
            modifier: modifier.modifier.clone(),
            arguments: Vec::with_capacity(modifier.arguments.len()),
        };
        for arg in &modifier.arguments {
            let arg_id = sqlx::query(
                "INSERT INTO route_modifier_argument (route_modifier_id, name, value)
                 VALUES (?, ?, ?)",
            )
            .bind(modifier_id)
            .bind(&arg.name)
            .bind(&arg.value)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
            let mut stored_arg = arg.clone();
            stored_arg.id = arg_id;
            stored_modifier.arguments.push(stored_arg);
        }
        stored.modifiers.push(stored_modifier);
    }
    Ok(stored)
}

/// Deletes a route and everything hanging off it. Returns `false` if it did
/// not exist. Call inside a transaction.
pub async fn delete(conn: &mut SqliteConnection, route_id: i64) -> StorageResult<bool> {
    sqlx::query(
        "DELETE FROM route_modifier_argument
         WHERE route_modifier_id IN (SELECT id FROM route_modifier WHERE route_id = ?)",
    )
    .bind(route_id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM route_modifier WHERE route_id = ?")
        .bind(route_id)
        .execute(&mut *conn)
        .await?;
    let deleted = sqlx::query("DELETE FROM route WHERE id = ?")
        .bind(route_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

async fn complete(conn: &mut SqliteConnection, row: RouteRow) -> StorageResult<RouteRecord> {
    let modifier_rows = sqlx::query_as::<_, ModifierRow>(
        "SELECT id, modifier FROM route_modifier WHERE route_id = ? ORDER BY id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut modifiers = Vec::with_capacity(modifier_rows.len());
    for modifier in modifier_rows {
        let arguments = sqlx::query_as::<_, ArgumentRow>(
            "SELECT id, name, value FROM route_modifier_argument
             WHERE route_modifier_id = ? ORDER BY id",
        )
        .bind(modifier.id)
        .fetch_all(&mut *conn)
        .await?;
        modifiers.push(RouteModifierRecord {
            id: modifier.id,
            modifier: modifier.modifier,
            arguments: arguments.into_iter().map(Into::into).collect(),
        });
    }
    Ok(RouteRecord {
        id: row.id,
        source: row.source,
        destination: row.destination,
        two_way: row.two_way,
        modifiers,
    })
}
