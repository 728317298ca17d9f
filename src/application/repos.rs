//! Repository traits describing persistence adapters.
//!
//! Every backend implements [`PostStore`] with identical observable behaviour:
//!
//! - `read` and `update` fail with [`RepoError::PostNotFound`] when the
//!   `(user_id, post_id)` pair does not exist. Backends translate their native
//!   not-found signal into this variant and never leak it.
//! - `delete` of an absent pair succeeds.
//! - `read_all` returns records in no particular order, and an empty vector
//!   when the user owns nothing.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::PostRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("post does not exist")]
    PostNotFound,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("operation cancelled: deadline exceeded")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PostNotFound)
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist a new post under a freshly generated `post_id`.
    async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError>;

    async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError>;

    async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError>;

    /// Replace `data` and refresh `updated_at`, returning the new timestamp.
    ///
    /// Never creates a record.
    async fn update(
        &self,
        user_id: &str,
        post_id: &str,
        data: &str,
    ) -> Result<OffsetDateTime, RepoError>;

    async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError>;
}
