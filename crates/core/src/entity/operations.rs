//! Store operations of an [`Entity`].

use std::collections::BTreeSet;

use crate::key::{Key, KeyId, PathElement, PathPart};
use crate::store::{Datastore, Operator, Query, Record};
use crate::value::Value;

use super::{Entity, EntityError, FetchOptions, Page, Result, SaveOptions};

/// Property every [`Entity::find_by_ancestor`] query requires to be `true`.
pub const ACTIVE_PROPERTY: &str = "active";

impl Entity {
    fn base_query(&self, client: &dyn Datastore) -> Query {
        Query::new(self.kind()).in_namespace(client.namespace())
    }

    fn new_key(
        &self,
        client: &dyn Datastore,
        id: Option<KeyId>,
        parent: Option<Key>,
    ) -> Result<Key> {
        let key = match parent {
            Some(parent) => parent.child(self.kind(), id)?,
            None => Key::from_elements(
                client.namespace().map(str::to_string),
                vec![PathElement::new(self.kind(), id)],
            )?,
        };
        Ok(key)
    }

    /// Writes the entity and returns its stored key.
    ///
    /// An entity without a key gets one from `options.id` and
    /// `options.parent`; the store assigns an id when none is given.
    /// `extra_props` are written alongside the persisted attributes and
    /// `excludes` are left out. Both only affect this write unless
    /// `retain_field_changes` is set.
    pub async fn save(&mut self, options: SaveOptions) -> Result<Key> {
        let client = self.require_client()?;
        let mut properties = self.to_map();

        let key = match self.key() {
            Some(key) => key.clone(),
            None => self.new_key(client.as_ref(), options.id, options.parent)?,
        };

        let retain = options.retain_field_changes;
        for (name, value) in options.extra_props {
            if retain {
                if !self.property_lookup().contains(&name) {
                    self.lookup_mut().push(name.clone());
                }
                self.set(name.clone(), value.clone());
            }
            properties.insert(name, value);
        }

        for name in &options.excludes {
            properties.remove(name);
            if retain {
                self.lookup_mut().retain(|n| n != name);
                self.demote(name);
            }
        }

        let exclude_from_indexes: BTreeSet<String> = self
            .schema()
            .excluded_from_index()
            .iter()
            .cloned()
            .chain(options.excludes)
            .collect();

        let record = Record {
            key,
            properties,
            exclude_from_indexes,
        };
        let stored = client.put(record).await?;
        tracing::debug!(kind = %self.kind(), key = %stored, "Saved entity");

        self.set_key(Some(stored.clone()));
        Ok(stored)
    }

    /// Gets the raw record stored under `key`.
    pub async fn find_by_key(&self, key: &Key) -> Result<Option<Record>> {
        let client = self.require_client()?;
        let record = client.get(key).await?;
        tracing::trace!(key = %key, found = record.is_some(), "Fetched by key");
        Ok(record)
    }

    /// Gets the entity stored under `key` as a fresh instance.
    pub async fn get_by_key(&self, key: &Key) -> Result<Option<Entity>> {
        Ok(self
            .find_by_key(key)
            .await?
            .map(|record| self.materialize(record)))
    }

    /// Gets the first entity of this kind whose `property` equals `value`.
    pub async fn get_first_match(
        &self,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Entity>> {
        let client = self.require_client()?;
        let query = self
            .base_query(client.as_ref())
            .filter(property, Operator::Equal, value)
            .limit(1);
        let page = client.query(&query).await?;
        Ok(page
            .records
            .into_iter()
            .next()
            .map(|record| self.materialize(record)))
    }

    /// Runs a single-filter query and returns raw records.
    pub async fn find_by_value(
        &self,
        property: &str,
        op: Operator,
        value: impl Into<Value>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let client = self.require_client()?;
        let query = self
            .base_query(client.as_ref())
            .filter(property, op, value)
            .limit(limit);
        Ok(client.query(&query).await?.records)
    }

    /// Gets entities whose `property` equals `value`, each as its own
    /// instance.
    pub async fn get_objects(
        &self,
        property: &str,
        value: impl Into<Value>,
        options: FetchOptions,
    ) -> Result<Page<Entity>> {
        let client = self.require_client()?;
        let query = self
            .base_query(client.as_ref())
            .filter(property, Operator::Equal, value)
            .limit(options.limit)
            .start_cursor(options.cursor);
        let page = client.query(&query).await?;

        let items: Vec<Entity> = page
            .records
            .into_iter()
            .map(|record| self.materialize(record))
            .collect();
        tracing::debug!(kind = %self.kind(), count = items.len(), "Fetched entities");

        Ok(Page {
            items,
            next_cursor: if options.paginate {
                page.next_cursor
            } else {
                None
            },
        })
    }

    /// Gets active records of this kind below `ancestor`.
    pub async fn find_by_ancestor(&self, ancestor: &Key, limit: usize) -> Result<Vec<Record>> {
        let client = self.require_client()?;
        let query = Query::new(self.kind())
            .in_namespace(ancestor.namespace())
            .ancestor(ancestor.clone())
            .filter(ACTIVE_PROPERTY, Operator::Equal, true)
            .limit(limit);
        Ok(client.query(&query).await?.records)
    }

    /// Deletes the stored entity. The instance keeps its key.
    pub async fn delete(&self) -> Result<()> {
        let key = self.key().ok_or(EntityError::MissingKey)?;
        let client = self.require_client()?;
        client.delete(key).await?;
        tracing::debug!(key = %key, "Deleted entity");
        Ok(())
    }

    /// Builds a key in the client's namespace from alternating kind/id
    /// segments.
    pub fn generate_key<I, P>(&self, path: I) -> Result<Key>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPart>,
    {
        let client = self.require_client()?;
        Ok(client.key(path.into_iter().map(Into::into).collect())?)
    }

    /// Reserves `count` ids for an incomplete key.
    pub async fn allocate_ids(&self, incomplete: &Key, count: usize) -> Result<Vec<Key>> {
        let client = self.require_client()?;
        let keys = client.allocate_ids(incomplete, count).await?;
        tracing::debug!(key = %incomplete, count = keys.len(), "Allocated ids");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_support::RecordingStore;
    use crate::entity::{Connection, Schema};
    use crate::store::StoreError;
    use crate::value::{PropertyMap, TaggedValue};
    use std::sync::Arc;

    fn user_schema() -> Schema {
        Schema::new("User")
            .field("username", Value::Null)
            .field("password", Value::Null)
            .exclude_from_index("password")
    }

    fn user(store: &RecordingStore) -> Entity {
        Entity::new(user_schema(), Connection::Client(Arc::new(store.clone()))).unwrap()
    }

    #[tokio::test]
    async fn test_operations_require_client() {
        let mut entity = Entity::new(user_schema(), Connection::Deferred).unwrap();
        assert!(matches!(
            entity.save(SaveOptions::new()).await,
            Err(EntityError::NotConnected)
        ));
        assert!(matches!(
            entity.get_by_key(&Key::with_id("User", 1)).await,
            Err(EntityError::NotConnected)
        ));
        assert!(matches!(
            entity.generate_key(["User"]),
            Err(EntityError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_save_assigns_key() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        entity.set("username", "alice");

        let key = entity.save(SaveOptions::new()).await.unwrap();
        assert!(key.is_complete());
        assert_eq!(key.kind(), "User");
        assert_eq!(entity.key(), Some(&key));

        let puts = store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(
            puts[0].properties.keys().collect::<Vec<_>>(),
            ["username", "password"]
        );
        assert!(puts[0].exclude_from_indexes.contains("password"));
    }

    #[tokio::test]
    async fn test_save_with_id_and_parent() {
        let store = RecordingStore::new();
        let parent = Key::with_id("Org", 3);

        let mut named = user(&store);
        let key = named
            .save(SaveOptions::new().id("alice").parent(parent.clone()))
            .await
            .unwrap();
        assert_eq!(key.parent(), Some(parent.clone()));
        assert_eq!(key.id(), Some(&KeyId::Name("alice".to_string())));

        let mut auto = user(&store);
        let key = auto
            .save(SaveOptions::new().parent(parent.clone()))
            .await
            .unwrap();
        assert_eq!(key.parent(), Some(parent));
        assert!(key.id().and_then(KeyId::as_id).is_some());
    }

    #[tokio::test]
    async fn test_save_uses_client_namespace() {
        let store = RecordingStore::with_namespace(Some("tests".to_string()));
        let mut entity = user(&store);
        let key = entity.save(SaveOptions::new().id(5)).await.unwrap();
        assert_eq!(key.namespace(), Some("tests"));
        assert_eq!(key.id(), Some(&KeyId::Id(5)));
    }

    #[tokio::test]
    async fn test_save_reuses_existing_key() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        let first = entity.save(SaveOptions::new()).await.unwrap();
        let second = entity.save(SaveOptions::new().id("ignored")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scoped_save_leaves_lookup_untouched() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        entity
            .save(
                SaveOptions::new()
                    .extra_prop("email", "a@example.com")
                    .exclude("password"),
            )
            .await
            .unwrap();

        let written = &store.puts()[0];
        assert!(written.properties.contains_key("email"));
        assert!(!written.properties.contains_key("password"));
        assert!(written.exclude_from_indexes.contains("password"));

        assert_eq!(entity.property_lookup(), ["username", "password"]);
        let map = entity.to_map();
        assert!(!map.contains_key("email"));
        assert!(map.contains_key("password"));
    }

    #[tokio::test]
    async fn test_retained_extra_prop_persists() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        entity
            .save(
                SaveOptions::new()
                    .extra_prop("email", "a@example.com")
                    .retain_field_changes(true),
            )
            .await
            .unwrap();

        let map = entity.to_map();
        assert_eq!(map.get("email"), Some(&Value::from("a@example.com")));
        assert!(entity.property_lookup().contains(&"email".to_string()));
    }

    #[tokio::test]
    async fn test_retained_exclude_disappears() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        entity.set_tagged("password", TaggedValue::new("secret"));
        entity
            .save(
                SaveOptions::new()
                    .exclude("password")
                    .exclude("missing")
                    .retain_field_changes(true),
            )
            .await
            .unwrap();

        assert!(!store.puts()[0].properties.contains_key("password"));
        assert!(!entity.to_map().contains_key("password"));
        assert_eq!(entity.property_lookup(), ["username"]);

        entity.save(SaveOptions::new()).await.unwrap();
        assert!(!store.puts()[1].properties.contains_key("password"));
    }

    #[tokio::test]
    async fn test_save_propagates_store_error() {
        let store = RecordingStore::failing_puts();
        let mut entity = user(&store);
        let result = entity.save(SaveOptions::new()).await;
        assert!(matches!(
            result,
            Err(EntityError::Store(StoreError::WriteFailed(_)))
        ));
        assert_eq!(entity.key(), None);
    }

    #[tokio::test]
    async fn test_save_rejects_incomplete_parent() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        let result = entity
            .save(SaveOptions::new().parent(Key::new("Org")))
            .await;
        assert!(matches!(result, Err(EntityError::InvalidKey(_))));
        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_key_missing_is_none() {
        let store = RecordingStore::new();
        let entity = user(&store);
        let found = entity.get_by_key(&Key::with_id("User", 404)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        entity.set("username", "alice");
        entity.set("password", "secret");
        let key = entity.save(SaveOptions::new()).await.unwrap();

        let fetched = entity.get_by_key(&key).await.unwrap().unwrap();
        assert_eq!(fetched.key(), Some(&key));
        assert_eq!(fetched.property_lookup(), entity.property_lookup());
        assert_eq!(fetched.get("username"), Some(&Value::from("alice")));
        assert_eq!(fetched.get("password"), Some(&Value::from("secret")));
    }

    #[tokio::test]
    async fn test_get_first_match() {
        let store = RecordingStore::new();
        let key = Key::with_id("User", 7);
        store.insert(Record::new(
            key.clone(),
            PropertyMap::from([("username", Value::from("bob")), ("age", Value::from(40))]),
        ));

        let entity = user(&store);
        let found = entity
            .get_first_match("username", "bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.key(), Some(&key));
        assert_eq!(found.property_lookup(), ["username", "age"]);

        let query = &store.queries()[0];
        assert_eq!(query.limit, Some(1));
        assert_eq!(query.filters[0].op, Operator::Equal);

        assert!(entity
            .get_first_match("username", "nobody")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_by_value_with_operator() {
        let store = RecordingStore::new();
        for (id, age) in [(1, 20), (2, 30), (3, 40)] {
            store.insert(Record::new(
                Key::with_id("User", id),
                PropertyMap::from([("age", age)]),
            ));
        }

        let entity = user(&store);
        let records = entity
            .find_by_value("age", Operator::GreaterThanOrEqual, 30, 10)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_get_objects_pagination() {
        let store = RecordingStore::new();
        for id in 1..=3 {
            store.insert(Record::new(
                Key::with_id("User", id),
                PropertyMap::from([("team", "red")]),
            ));
        }
        let entity = user(&store);

        let first = entity
            .get_objects("team", "red", FetchOptions::new().limit(2).paginate(true))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_ne!(first.items[0].key(), first.items[1].key());
        let cursor = first.next_cursor.clone();
        assert!(cursor.is_some());

        let second = entity
            .get_objects(
                "team",
                "red",
                FetchOptions::new().limit(2).paginate(true).cursor(cursor),
            )
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.next_cursor, None);
    }

    #[tokio::test]
    async fn test_get_objects_without_paginate_hides_cursor() {
        let store = RecordingStore::new();
        for id in 1..=3 {
            store.insert(Record::new(
                Key::with_id("User", id),
                PropertyMap::from([("team", "red")]),
            ));
        }
        let entity = user(&store);
        let page = entity
            .get_objects("team", "red", FetchOptions::new().limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_get_objects_entries_are_independent() {
        let store = RecordingStore::new();
        store.insert(Record::new(
            Key::with_id("User", 1),
            PropertyMap::from([("team", "red"), ("username", "alice")]),
        ));
        store.insert(Record::new(
            Key::with_id("User", 2),
            PropertyMap::from([("team", "red"), ("username", "bob")]),
        ));
        let entity = user(&store);

        let mut page = entity
            .get_objects("team", "red", FetchOptions::new())
            .await
            .unwrap();
        page.items[0].set("username", "changed");
        assert_eq!(page.items[1].get("username"), Some(&Value::from("bob")));
        assert_eq!(entity.get("username"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_get_objects_empty_page() {
        let store = RecordingStore::new();
        let entity = user(&store);
        let page = entity
            .get_objects("team", "blue", FetchOptions::new().paginate(true))
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_find_by_ancestor_requires_active() {
        let store = RecordingStore::new();
        let org = Key::with_id("Org", 1);
        store.insert(Record::new(
            org.child("User", Some(KeyId::Id(1))).unwrap(),
            PropertyMap::from([("active", true)]),
        ));
        store.insert(Record::new(
            org.child("User", Some(KeyId::Id(2))).unwrap(),
            PropertyMap::from([("active", false)]),
        ));
        store.insert(Record::new(
            Key::with_id("User", 3),
            PropertyMap::from([("active", true)]),
        ));

        let entity = user(&store);
        let records = entity.find_by_ancestor(&org, 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.parent(), Some(org));

        let query = &store.queries()[0];
        assert_eq!(query.filters[0].property, ACTIVE_PROPERTY);
        assert_eq!(query.filters[0].value, Value::Boolean(true));
    }

    #[tokio::test]
    async fn test_delete_requires_key() {
        let store = RecordingStore::new();
        let entity = user(&store);
        assert!(matches!(entity.delete().await, Err(EntityError::MissingKey)));
    }

    #[tokio::test]
    async fn test_delete_keeps_key() {
        let store = RecordingStore::new();
        let mut entity = user(&store);
        let key = entity.save(SaveOptions::new()).await.unwrap();

        entity.delete().await.unwrap();
        assert_eq!(entity.key(), Some(&key));
        assert_eq!(store.deleted(), vec![key.clone()]);
        assert!(entity.get_by_key(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generate_key() {
        let store = RecordingStore::with_namespace(Some("tests".to_string()));
        let entity = user(&store);

        let key = entity
            .generate_key([PathPart::from("Org"), 1.into(), "User".into(), "bob".into()])
            .unwrap();
        assert_eq!(key.namespace(), Some("tests"));
        assert_eq!(key.to_string(), "tests|Org:1/User:bob");

        let incomplete = entity.generate_key(["User"]).unwrap();
        assert!(!incomplete.is_complete());

        assert!(matches!(
            entity.generate_key([PathPart::Id(1)]),
            Err(EntityError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_allocate_ids() {
        let store = RecordingStore::new();
        let entity = user(&store);
        let keys = entity.allocate_ids(&Key::new("User"), 3).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(Key::is_complete));
    }
}
