use crate::application::repos::RepoError;

/// Translate driver errors into the store error taxonomy.
///
/// `RowNotFound` can only surface from `fetch_one`; it maps to the contract's
/// not-found kind so it never escapes as a driver signal.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::PostNotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request")
                || db.message().contains("canceling statement due to statement timeout") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}
