//! One-time wiring of the configured store and cache.

use std::sync::Arc;

use tracing::info;

use crate::{
    application::{posts::PostService, repos::PostStore},
    cache::{CacheBackend, CacheConfig, LruPostCache, MemcachedCache, NoopCache, PostCache},
    config::{Settings, StorageBackend},
    infra::{
        db::PostgresPostStore, dynamodb::DynamoPostStore, error::InfraError,
        memory::MemoryPostStore,
    },
};

const SOURCE: &str = "infra::bootstrap";

/// Build the store selected by `storage.backend`.
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn PostStore>, InfraError> {
    let backend = settings.storage.backend;
    let store: Arc<dyn PostStore> = match backend {
        StorageBackend::Memory => Arc::new(MemoryPostStore::new()),
        StorageBackend::Postgres => {
            let pool = connect_postgres(settings).await?;
            Arc::new(PostgresPostStore::new(pool))
        }
        StorageBackend::DynamoDb => {
            let client = DynamoPostStore::connect(
                &settings.dynamodb.region,
                settings.dynamodb.endpoint_url.as_deref(),
            )
            .await;
            Arc::new(DynamoPostStore::new(client, settings.dynamodb.table.clone()))
        }
    };

    info!(target = SOURCE, backend = backend.as_str(), "post store ready");
    Ok(store)
}

/// Build the cache selected by `cache.backend`.
pub async fn build_cache(settings: &Settings) -> Result<Arc<dyn PostCache>, InfraError> {
    let config = CacheConfig::from(&settings.cache);
    let cache: Arc<dyn PostCache> = match config.backend {
        CacheBackend::None => Arc::new(NoopCache::new()),
        CacheBackend::Memory => Arc::new(LruPostCache::new(&config)),
        CacheBackend::Memcached => {
            let connect_config = config.clone();
            let cache = tokio::task::spawn_blocking(move || MemcachedCache::connect(&connect_config))
                .await
                .map_err(|err| InfraError::cache(format!("memcached connect task failed: {err}")))?
                .map_err(|err| InfraError::cache(format!("failed to connect to memcached: {err}")))?;
            Arc::new(cache)
        }
    };

    info!(
        target = SOURCE,
        backend = config.backend.as_str(),
        capacity = config.capacity_non_zero().get(),
        "post cache ready"
    );
    Ok(cache)
}

/// Compose the configured store and cache behind the operation deadline.
pub async fn build_service(settings: &Settings) -> Result<PostService, InfraError> {
    let store = build_store(settings).await?;
    let cache = build_cache(settings).await?;
    Ok(PostService::new(
        store,
        cache,
        settings.storage.operation_timeout,
    ))
}

/// Create the table backing the configured store. Safe to run repeatedly.
pub async fn bootstrap_storage(settings: &Settings) -> Result<(), InfraError> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            info!(target = SOURCE, "memory store needs no bootstrap");
        }
        StorageBackend::Postgres => {
            let pool = connect_postgres(settings).await?;
            PostgresPostStore::bootstrap_schema(&pool)
                .await
                .map_err(|err| InfraError::database(format!("failed to create table: {err}")))?;
            pool.close().await;
            info!(target = SOURCE, table = "post", "postgres schema ready");
        }
        StorageBackend::DynamoDb => {
            let client = DynamoPostStore::connect(
                &settings.dynamodb.region,
                settings.dynamodb.endpoint_url.as_deref(),
            )
            .await;
            DynamoPostStore::bootstrap_table(&client, &settings.dynamodb.table).await?;
            info!(
                target = SOURCE,
                table = settings.dynamodb.table.as_str(),
                "dynamodb table ready"
            );
        }
    }
    Ok(())
}

async fn connect_postgres(settings: &Settings) -> Result<sqlx::PgPool, InfraError> {
    let url = settings
        .postgres
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("postgres url is not configured"))?;

    PostgresPostStore::connect(url, settings.postgres.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))
}
