use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::instrument;

use crate::application::repos::{PostStore, RepoError};
use crate::domain::clock;
use crate::domain::entities::PostRecord;

use super::PostgresPostStore;
use super::util::map_sqlx_error;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    user_id: String,
    post_id: String,
    data: Option<String>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let created_at = row.created_at.ok_or_else(|| {
            RepoError::from_persistence(format!("post `{}` has no created_at", row.post_id))
        })?;
        let updated_at = row.updated_at.unwrap_or(created_at);
        Ok(PostRecord {
            user_id: row.user_id,
            post_id: row.post_id,
            data: row.data.unwrap_or_default(),
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl PostStore for PostgresPostStore {
    #[instrument(name = "postgres.Create", skip(self, data))]
    async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError> {
        let post_id = self.ids.new_id();
        let now = clock::now();

        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO post (user_id, post_id, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING user_id, post_id, data, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&post_id)
        .bind(data)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|err| match err {
            // An INSERT ... RETURNING always yields a row; never report it as not-found.
            sqlx::Error::RowNotFound => RepoError::from_persistence("insert returned no row"),
            other => map_sqlx_error(other),
        })?;

        PostRecord::try_from(row)
    }

    #[instrument(name = "postgres.Read", skip(self))]
    async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT user_id, post_id, data, created_at, updated_at
            FROM post
            WHERE user_id = $1 AND post_id = $2
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => PostRecord::try_from(row),
            None => Err(RepoError::PostNotFound),
        }
    }

    #[instrument(name = "postgres.ReadAll", skip(self))]
    async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT user_id, post_id, data, created_at, updated_at
            FROM post
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostRecord::try_from).collect()
    }

    #[instrument(name = "postgres.Update", skip(self, data))]
    async fn update(
        &self,
        user_id: &str,
        post_id: &str,
        data: &str,
    ) -> Result<OffsetDateTime, RepoError> {
        let now = clock::now();
        let result = sqlx::query(
            r#"
            UPDATE post
            SET data = $3,
                updated_at = $4
            WHERE user_id = $1 AND post_id = $2
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(data)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::PostNotFound);
        }

        Ok(now)
    }

    #[instrument(name = "postgres.Delete", skip(self))]
    async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM post WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
