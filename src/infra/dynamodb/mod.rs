//! DynamoDB-backed store.
//!
//! Table layout: hash key `user_id` (S), range key `post_id` (S), with `data`,
//! `created_at` and `updated_at` stored as string attributes. Reads are
//! strongly consistent so a read observes every acknowledged write.
//!
//! Native signals are translated here: a `GetItem` without an item and a
//! `ConditionalCheckFailedException` on `UpdateItem` both become
//! [`RepoError::PostNotFound`].

mod item;

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client,
    config::Region,
    error::{DisplayErrorContext, SdkError},
    types::{
        AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
    },
};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::application::repos::{PostStore, RepoError};
use crate::domain::clock;
use crate::domain::entities::PostRecord;
use crate::domain::ids::{IdGenerator, UuidIdGenerator};
use crate::infra::error::InfraError;

use item::{DATA, Item, POST_ID, UPDATED_AT, USER_ID};

#[derive(Clone)]
pub struct DynamoPostStore {
    client: Client,
    table: String,
    ids: Arc<dyn IdGenerator>,
}

impl DynamoPostStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self::with_id_generator(client, table, Arc::new(UuidIdGenerator))
    }

    pub fn with_id_generator(
        client: Client,
        table: impl Into<String>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            ids,
        }
    }

    /// Build a client for `region`, optionally pointed at a custom endpoint
    /// such as DynamoDB Local.
    pub async fn connect(region: &str, endpoint_url: Option<&str>) -> Client {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Client::new(&sdk_config)
    }

    /// Create the posts table with on-demand capacity; an existing table is left untouched.
    pub async fn bootstrap_table(client: &Client, table: &str) -> Result<(), InfraError> {
        let attribute = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|err| InfraError::dynamodb(err.to_string()))
        };
        let key_element = |name: &str, key_type: KeyType| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(|err| InfraError::dynamodb(err.to_string()))
        };

        let result = client
            .create_table()
            .table_name(table)
            .attribute_definitions(attribute(USER_ID)?)
            .attribute_definitions(attribute(POST_ID)?)
            .key_schema(key_element(USER_ID, KeyType::Hash)?)
            .key_schema(key_element(POST_ID, KeyType::Range)?)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_in_use_exception()) =>
            {
                debug!(table, "dynamodb table already exists");
                Ok(())
            }
            Err(err) => Err(InfraError::dynamodb(format!(
                "failed to create table `{table}`: {}",
                DisplayErrorContext(&err)
            ))),
        }
    }
}

fn map_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> RepoError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => RepoError::Timeout,
        other => RepoError::from_persistence(format!(
            "dynamodb {operation} failed: {}",
            DisplayErrorContext(&other)
        )),
    }
}

#[async_trait]
impl PostStore for DynamoPostStore {
    #[instrument(name = "dynamodb.Create", skip(self, data))]
    async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError> {
        let record = PostRecord::new(user_id, self.ids.new_id(), data, clock::now());

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item::to_item(&record)?))
            .condition_expression("attribute_not_exists(#post_id)")
            .expression_attribute_names("#post_id", POST_ID)
            .send()
            .await
            .map_err(|err| map_sdk_error("PutItem", err))?;

        Ok(record)
    }

    #[instrument(name = "dynamodb.Read", skip(self))]
    async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(item::key(user_id, post_id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| map_sdk_error("GetItem", err))?;

        match output.item() {
            Some(found) => item::from_item(found),
            None => Err(RepoError::PostNotFound),
        }
    }

    #[instrument(name = "dynamodb.ReadAll", skip(self))]
    async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table)
                .key_condition_expression("#user_id = :user_id")
                .expression_attribute_names("#user_id", USER_ID)
                .expression_attribute_values(":user_id", item::string_value(user_id))
                .consistent_read(true)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| map_sdk_error("Query", err))?;

            for found in output.items() {
                records.push(item::from_item(found)?);
            }

            match output.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }

        Ok(records)
    }

    #[instrument(name = "dynamodb.Update", skip(self, data))]
    async fn update(
        &self,
        user_id: &str,
        post_id: &str,
        data: &str,
    ) -> Result<OffsetDateTime, RepoError> {
        let now = clock::now();

        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .set_key(Some(item::key(user_id, post_id)))
            .update_expression("SET #data = :data, #updated_at = :updated_at")
            .condition_expression("attribute_exists(#post_id)")
            .expression_attribute_names("#data", DATA)
            .expression_attribute_names("#updated_at", UPDATED_AT)
            .expression_attribute_names("#post_id", POST_ID)
            .expression_attribute_values(":data", item::string_value(data))
            .expression_attribute_values(":updated_at", item::timestamp_value(now)?)
            .send()
            .await;

        match result {
            Ok(_) => Ok(now),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_conditional_check_failed_exception()) =>
            {
                Err(RepoError::PostNotFound)
            }
            Err(err) => Err(map_sdk_error("UpdateItem", err)),
        }
    }

    #[instrument(name = "dynamodb.Delete", skip(self))]
    async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .set_key(Some(item::key(user_id, post_id)))
            .send()
            .await
            .map_err(|err| map_sdk_error("DeleteItem", err))?;

        Ok(())
    }
}
