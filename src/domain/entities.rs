//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A post owned by a user, identified by the `(user_id, post_id)` pair.
///
/// Timestamps are produced by [`crate::domain::clock::now`], so they carry
/// microsecond precision on every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub user_id: String,
    pub post_id: String,
    pub data: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PostRecord {
    /// Build a freshly created record where `updated_at == created_at`.
    pub fn new(
        user_id: impl Into<String>,
        post_id: impl Into<String>,
        data: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            post_id: post_id.into(),
            data: data.into(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Return a copy carrying new `data` and `updated_at`, keeping identity and
    /// `created_at`.
    pub fn with_update(&self, data: impl Into<String>, updated_at: OffsetDateTime) -> Self {
        Self {
            user_id: self.user_id.clone(),
            post_id: self.post_id.clone(),
            data: data.into(),
            created_at: self.created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock;

    #[test]
    fn new_record_has_equal_timestamps() {
        let now = clock::now();
        let record = PostRecord::new("user", "post", "hello", now);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn with_update_preserves_identity_and_created_at() {
        let created = clock::now();
        let record = PostRecord::new("user", "post", "hello", created);
        let later = clock::now();

        let updated = record.with_update("bye", later);

        assert_eq!(updated.user_id, "user");
        assert_eq!(updated.post_id, "post");
        assert_eq!(updated.data, "bye");
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn json_roundtrip_keeps_microseconds() {
        let record = PostRecord::new("user", "post", "payload", clock::now());
        let encoded = serde_json::to_string(&record).expect("serialize record");
        let decoded: PostRecord = serde_json::from_str(&encoded).expect("deserialize record");
        assert_eq!(decoded, record);
    }
}
