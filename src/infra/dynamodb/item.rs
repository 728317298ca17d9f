//! Conversion between [`PostRecord`] and DynamoDB items.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::application::repos::RepoError;
use crate::domain::entities::PostRecord;

pub(crate) const USER_ID: &str = "user_id";
pub(crate) const POST_ID: &str = "post_id";
pub(crate) const DATA: &str = "data";
pub(crate) const CREATED_AT: &str = "created_at";
pub(crate) const UPDATED_AT: &str = "updated_at";

pub(crate) type Item = HashMap<String, AttributeValue>;

pub(crate) fn string_value(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

pub(crate) fn timestamp_value(value: OffsetDateTime) -> Result<AttributeValue, RepoError> {
    value
        .format(&Rfc3339)
        .map(AttributeValue::S)
        .map_err(|err| RepoError::from_persistence(format!("failed to format timestamp: {err}")))
}

/// Composite primary key for a post.
pub(crate) fn key(user_id: &str, post_id: &str) -> Item {
    HashMap::from([
        (USER_ID.to_string(), string_value(user_id)),
        (POST_ID.to_string(), string_value(post_id)),
    ])
}

pub(crate) fn to_item(record: &PostRecord) -> Result<Item, RepoError> {
    let mut item = key(&record.user_id, &record.post_id);
    item.insert(DATA.to_string(), string_value(&record.data));
    item.insert(CREATED_AT.to_string(), timestamp_value(record.created_at)?);
    item.insert(UPDATED_AT.to_string(), timestamp_value(record.updated_at)?);
    Ok(item)
}

pub(crate) fn from_item(item: &Item) -> Result<PostRecord, RepoError> {
    Ok(PostRecord {
        user_id: string_attr(item, USER_ID)?.to_string(),
        post_id: string_attr(item, POST_ID)?.to_string(),
        data: string_attr(item, DATA)?.to_string(),
        created_at: timestamp_attr(item, CREATED_AT)?,
        updated_at: timestamp_attr(item, UPDATED_AT)?,
    })
}

fn string_attr<'a>(item: &'a Item, name: &'static str) -> Result<&'a str, RepoError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.as_str()),
        Some(_) => Err(RepoError::from_persistence(format!(
            "attribute `{name}` is not a string"
        ))),
        None => Err(RepoError::from_persistence(format!(
            "item is missing attribute `{name}`"
        ))),
    }
}

fn timestamp_attr(item: &Item, name: &'static str) -> Result<OffsetDateTime, RepoError> {
    let raw = string_attr(item, name)?;
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| {
        RepoError::from_persistence(format!("attribute `{name}` is not RFC 3339: {err}"))
    })
}
