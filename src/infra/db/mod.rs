//! Postgres-backed store.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS post (
//!     user_id TEXT NOT NULL,
//!     post_id TEXT NOT NULL,
//!     data TEXT,
//!     created_at TIMESTAMPTZ,
//!     updated_at TIMESTAMPTZ,
//!     PRIMARY KEY (user_id, post_id)
//! );
//! ```

mod posts;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::domain::ids::{IdGenerator, UuidIdGenerator};

const CREATE_POST_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS post (
    user_id TEXT NOT NULL,
    post_id TEXT NOT NULL,
    data TEXT,
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ,
    PRIMARY KEY (user_id, post_id)
)
"#;

#[derive(Clone)]
pub struct PostgresPostStore {
    pool: Arc<PgPool>,
    ids: Arc<dyn IdGenerator>,
}

impl PostgresPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_id_generator(pool, Arc::new(UuidIdGenerator))
    }

    pub fn with_id_generator(pool: PgPool, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            pool: Arc::new(pool),
            ids,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Create the `post` table when it does not exist yet.
    pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        query(CREATE_POST_TABLE).execute(pool).await.map(|_| ())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
