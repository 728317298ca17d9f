use std::error::Error as StdError;

use thiserror::Error;

use crate::{application::repos::RepoError, config::LoadError, infra::error::InfraError};

/// Flattened view of an error and its `source()` chain, outermost first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn chain(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration")]
    Config(#[source] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<LoadError> for AppError {
    fn from(error: LoadError) -> Self {
        Self::Config(error)
    }
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status reported by the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Repo(RepoError::PostNotFound) => 3,
            AppError::Repo(RepoError::Timeout) => 4,
            AppError::Config(_) => 2,
            AppError::Infra(InfraError::Configuration { .. }) => 2,
            AppError::Repo(RepoError::Persistence(_))
            | AppError::Infra(_)
            | AppError::Unexpected(_) => 1,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_walks_source_chain() {
        let error = AppError::from(LoadError::Invalid {
            key: "cache.capacity",
            reason: "must be greater than zero".to_string(),
        });

        let report = error.report();
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[0], "failed to load configuration");
        assert!(report.messages[1].contains("cache.capacity"));
        assert!(report.chain().contains(": invalid configuration"));
    }

    #[test]
    fn exit_codes_distinguish_missing_posts() {
        assert_eq!(AppError::from(RepoError::PostNotFound).exit_code(), 3);
        assert_eq!(AppError::from(RepoError::Timeout).exit_code(), 4);
        assert_eq!(
            AppError::from(InfraError::configuration("no url")).exit_code(),
            2
        );
        assert_eq!(
            AppError::from(RepoError::Persistence("down".into())).exit_code(),
            1
        );
        assert_eq!(
            AppError::from(InfraError::database("refused")).exit_code(),
            1
        );
    }
}
