//! Result store for the Gantry CI orchestrator.
//!
//! The [`BuildStore`] trait is the persistence boundary: a durable record of
//! builds and their test results, queryable by id and in reverse-chronological
//! order. It is injected explicitly wherever persistence is needed; there is
//! no ambient global connection.
//!
//! Two backends are provided: PostgreSQL for deployments and an in-memory
//! store for tests and local development.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryBuildStore;
pub use postgres::PgBuildStore;
pub use store::BuildStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
