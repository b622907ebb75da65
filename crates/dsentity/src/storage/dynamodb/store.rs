//! DynamoDB store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;

use dsentity_core::key::{Key, KeyId};
use dsentity_core::store::{
    collect_page, record_matches, Cursor, Datastore, Query, QueryPage, Record, Result, StoreError,
};

use super::conversions::{item_to_record, record_to_item};
use super::error::{
    map_delete_item_error, map_get_item_error, map_put_item_error, map_query_error,
    map_update_item_error, put_condition_failed, update_condition_failed,
};
use super::expressions::{
    build_query_expressions, INSERT_ONLY_CONDITION, RAISE_SEQUENCE, RAISE_SEQUENCE_CONDITION,
};
use super::keys;

/// Connection settings for [`DynamoDbStore::connect`].
#[derive(Debug, Clone, Default)]
pub struct DynamoDbSettings {
    pub table_name: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub profile: Option<String>,
}

/// DynamoDB-based store.
///
/// Records live in one table keyed by `PK`, with a `KindIndex` GSI
/// (`KIND_NS` hash key, `PK` range key) for kind and ancestor queries.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
    namespace: Option<String>,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            namespace: None,
        }
    }

    /// Creates a store using the AWS SDK default credential chain.
    pub async fn connect(settings: DynamoDbSettings) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint_url) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        tracing::debug!(
            table = %settings.table_name,
            region = %settings.region,
            endpoint = ?settings.endpoint_url,
            "Connecting to DynamoDB"
        );
        Ok(Self::new(Client::new(&config), settings.table_name))
    }

    /// Returns a handle on the same table scoped to another namespace.
    pub fn with_namespace(&self, namespace: Option<String>) -> Self {
        Self {
            client: self.client.clone(),
            table_name: self.table_name.clone(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Reserves `count` ids for the key's namespace and kind, returning the
    /// first one.
    async fn reserve_ids(&self, key: &Key, count: usize) -> Result<i64> {
        let counter = keys::sequence_pk(key.namespace(), key.kind());

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(counter.clone()))
            .update_expression("ADD #next_id :count")
            .expression_attribute_names("#next_id", keys::NEXT_ID)
            .expression_attribute_values(":count", AttributeValue::N(count.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, &counter))?;

        let last = result
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.get(keys::NEXT_ID))
            .and_then(|value| value.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| {
                StoreError::InvalidData(format!("Missing or invalid field: {}", keys::NEXT_ID))
            })?;

        Ok(last - count as i64 + 1)
    }

    /// Raises the key's sequence to at least `id`.
    async fn raise_sequence(&self, key: &Key, id: i64) -> Result<()> {
        let counter = keys::sequence_pk(key.namespace(), key.kind());

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(counter.clone()))
            .update_expression(RAISE_SEQUENCE)
            .condition_expression(RAISE_SEQUENCE_CONDITION)
            .expression_attribute_names("#next_id", keys::NEXT_ID)
            .expression_attribute_values(":id", AttributeValue::N(id.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if update_condition_failed(&e) => Ok(()),
            Err(e) => Err(map_update_item_error(e, &counter)),
        }
    }

    /// Writes a record under a fresh id, skipping ids that are already taken.
    async fn put_with_new_id(&self, record: Record) -> Result<Key> {
        loop {
            let id = self.reserve_ids(&record.key, 1).await?;
            let key = record.key.completed(id)?;
            let item = record_to_item(&Record {
                key: key.clone(),
                ..record.clone()
            })?;
            let pk = keys::entity_pk(&key)?;

            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression(INSERT_ONLY_CONDITION)
                .expression_attribute_names("#pk", keys::PK)
                .send()
                .await;

            match result {
                Ok(_) => return Ok(key),
                Err(e) if put_condition_failed(&e) => {
                    tracing::debug!(key = %key, "Id already taken, reserving another");
                }
                Err(e) => return Err(map_put_item_error(e, &pk)),
            }
        }
    }
}

#[async_trait]
impl Datastore for DynamoDbStore {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    async fn get(&self, key: &Key) -> Result<Option<Record>> {
        let pk = keys::entity_pk(key)?;

        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(pk.clone()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_get_item_error(e, &pk))?;

        match result.item {
            Some(item) => Ok(Some(item_to_record(&item)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, record: Record) -> Result<Key> {
        let key = match record.key.id() {
            Some(KeyId::Id(id)) => {
                self.raise_sequence(&record.key, *id).await?;
                record.key.clone()
            }
            Some(KeyId::Name(_)) => record.key.clone(),
            None => {
                let key = self.put_with_new_id(record).await?;
                tracing::trace!(key = %key, "Stored record");
                return Ok(key);
            }
        };
        let item = record_to_item(&Record {
            key: key.clone(),
            ..record
        })?;
        let pk = keys::entity_pk(&key)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &pk))?;

        tracing::trace!(key = %key, "Stored record");
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let pk = keys::entity_pk(key)?;

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(pk.clone()))
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, &pk))?;

        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let expressions = build_query_expressions(query)?;
        let kind_ns = keys::kind_ns(query.namespace.as_deref(), &query.kind);
        let page_size = query.page_size();

        let mut start_key = match &query.cursor {
            Some(cursor) => Some(start_key(cursor, &kind_ns)?),
            None => None,
        };

        // Keep reading until one match past the page is found, so the page
        // knows whether a cursor is needed.
        let mut candidates = Vec::new();
        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(keys::KIND_INDEX)
                .key_condition_expression(&expressions.key_condition)
                .set_filter_expression(expressions.filter.clone())
                .set_expression_attribute_names(Some(expressions.names.clone()))
                .set_expression_attribute_values(Some(expressions.values.clone()))
                .set_exclusive_start_key(start_key.take())
                .limit(i32::try_from(page_size + 1).unwrap_or(i32::MAX))
                .send()
                .await
                .map_err(map_query_error)?;

            for item in result.items.unwrap_or_default() {
                let record = item_to_record(&item)?;
                if record_matches(query, &record) {
                    candidates.push((keys::entity_pk(&record.key)?, record));
                }
            }

            match result.last_evaluated_key {
                Some(last) if candidates.len() <= page_size => start_key = Some(last),
                _ => break,
            }
        }

        tracing::trace!(
            kind = %query.kind,
            candidates = candidates.len(),
            "Queried KindIndex"
        );
        collect_page(candidates, query)
    }

    async fn allocate_ids(&self, incomplete: &Key, count: usize) -> Result<Vec<Key>> {
        if incomplete.is_complete() {
            return Err(StoreError::InvalidData(format!(
                "cannot allocate ids for complete key {incomplete}"
            )));
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let first = self.reserve_ids(incomplete, count).await?;
        tracing::debug!(kind = incomplete.kind(), count, first, "Allocated ids");
        (first..first + count as i64)
            .map(|id| incomplete.completed(id).map_err(StoreError::from))
            .collect()
    }
}

/// Rebuild the `KindIndex` start key from a cursor.
fn start_key(cursor: &Cursor, kind_ns: &str) -> Result<HashMap<String, AttributeValue>> {
    let pk = cursor.decode_position()?;
    Ok(HashMap::from([
        (keys::PK.to_string(), AttributeValue::S(pk)),
        (keys::KIND_NS.to_string(), AttributeValue::S(kind_ns.to_string())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_key_from_cursor() {
        let cursor = Cursor::encode_position("|User:i0000000000000000003");
        let start = start_key(&cursor, "|User").unwrap();

        assert_eq!(
            start.get(keys::PK).unwrap().as_s().unwrap(),
            "|User:i0000000000000000003"
        );
        assert_eq!(start.get(keys::KIND_NS).unwrap().as_s().unwrap(), "|User");
    }

    #[test]
    fn test_start_key_rejects_garbage_cursor() {
        let cursor = Cursor::new("not a cursor!");
        assert!(matches!(
            start_key(&cursor, "|User"),
            Err(StoreError::InvalidCursor(_))
        ));
    }

    #[tokio::test]
    async fn test_with_namespace_keeps_table() {
        let config = aws_config::SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let store = DynamoDbStore::new(Client::new(&config), "entities");
        let scoped = store.with_namespace(Some("tests".to_string()));

        assert_eq!(scoped.table_name(), "entities");
        assert_eq!(scoped.namespace(), Some("tests"));
        assert_eq!(store.with_namespace(Some(String::new())).namespace(), None);
    }
}
