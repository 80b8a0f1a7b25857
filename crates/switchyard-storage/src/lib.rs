//! # Switchyard Storage
//!
//! SQLite persistence for relay stacks, routes and hop styles, built on
//! `sqlx`.
//!
//! Reads go through the repositories, which hold a pool. Multi-row writes are
//! free functions taking a `&mut SqliteConnection` so callers can group them
//! in one transaction and decide when to commit:
//!
//! ```rust,ignore
//! let mut tx = storage.begin().await?;
//! let stored = relay::insert(&mut tx, &config).await?;
//! // ... build the live object, roll back on failure ...
//! tx.commit().await?;
//! ```

pub mod error;
pub mod relay;
pub mod route;
pub mod schema;
pub mod style;

use sqlx::{Sqlite, SqlitePool, Transaction};

pub use error::{StorageError, StorageResult};
pub use relay::{RelayRepository, RelayRowCounts};
pub use route::RouteRepository;
pub use style::HopStyleRepository;

/// An open write transaction.
pub type StorageTransaction = Transaction<'static, Sqlite>;

/// Commits `tx`, mapping the driver error.
pub async fn commit(tx: StorageTransaction) -> StorageResult<()> {
    Ok(tx.commit().await?)
}

/// Rolls `tx` back, mapping the driver error.
pub async fn rollback(tx: StorageTransaction) -> StorageResult<()> {
    Ok(tx.rollback().await?)
}

/// Entry point bundling the pool and its repositories.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
    relays: RelayRepository,
    routes: RouteRepository,
    styles: HopStyleRepository,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            relays: RelayRepository::new(pool.clone()),
            routes: RouteRepository::new(pool.clone()),
            styles: HopStyleRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connects to `url` and bootstraps the schema.
    pub async fn open(url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = schema::connect(url, max_connections).await?;
        schema::bootstrap(&pool).await?;
        Ok(Self::new(pool))
    }

    /// An in-memory database, mainly for tests.
    pub async fn memory() -> StorageResult<Self> {
        Ok(Self::new(schema::memory().await?))
    }

    pub async fn begin(&self) -> StorageResult<StorageTransaction> {
        Ok(self.pool.begin().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn relays(&self) -> &RelayRepository {
        &self.relays
    }

    pub fn routes(&self) -> &RouteRepository {
        &self.routes
    }

    pub fn styles(&self) -> &HopStyleRepository {
        &self.styles
    }
}
