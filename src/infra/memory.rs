//! In-process map store.
//!
//! A two-level map `user_id -> post_id -> PostRecord` behind one mutex. Every
//! operation, reads included, takes the lock around the whole structure since a
//! concurrent `create` may be inserting an inner map. No durability: contents
//! are lost when the process exits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::instrument;

use crate::application::repos::{PostStore, RepoError};
use crate::cache::lock::mutex_lock;
use crate::domain::clock;
use crate::domain::entities::PostRecord;
use crate::domain::ids::{IdGenerator, UuidIdGenerator};

const SOURCE: &str = "infra::memory";

type UserPosts = HashMap<String, PostRecord>;

pub struct MemoryPostStore {
    posts: Mutex<HashMap<String, UserPosts>>,
    ids: Arc<dyn IdGenerator>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UuidIdGenerator))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
            ids,
        }
    }

    /// Total number of stored posts across all users.
    pub fn len(&self) -> usize {
        mutex_lock(&self.posts, SOURCE, "len")
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryPostStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    #[instrument(name = "memory.Create", skip(self, data))]
    async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError> {
        let post_id = self.ids.new_id();
        let record = PostRecord::new(user_id, post_id.clone(), data, clock::now());

        mutex_lock(&self.posts, SOURCE, "create")
            .entry(user_id.to_string())
            .or_default()
            .insert(post_id, record.clone());

        Ok(record)
    }

    #[instrument(name = "memory.Read", skip(self))]
    async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError> {
        mutex_lock(&self.posts, SOURCE, "read")
            .get(user_id)
            .and_then(|posts| posts.get(post_id))
            .cloned()
            .ok_or(RepoError::PostNotFound)
    }

    #[instrument(name = "memory.ReadAll", skip(self))]
    async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
        let records = mutex_lock(&self.posts, SOURCE, "read_all")
            .get(user_id)
            .map(|posts| posts.values().cloned().collect())
            .unwrap_or_default();
        Ok(records)
    }

    #[instrument(name = "memory.Update", skip(self, data))]
    async fn update(
        &self,
        user_id: &str,
        post_id: &str,
        data: &str,
    ) -> Result<OffsetDateTime, RepoError> {
        let mut posts = mutex_lock(&self.posts, SOURCE, "update");
        let record = posts
            .get_mut(user_id)
            .and_then(|user_posts| user_posts.get_mut(post_id))
            .ok_or(RepoError::PostNotFound)?;

        let now = clock::now();
        *record = record.with_update(data, now);
        Ok(now)
    }

    #[instrument(name = "memory.Delete", skip(self))]
    async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError> {
        let mut posts = mutex_lock(&self.posts, SOURCE, "delete");
        if let Some(user_posts) = posts.get_mut(user_id) {
            user_posts.remove(post_id);
            if user_posts.is_empty() {
                posts.remove(user_id);
            }
        }
        Ok(())
    }
}
