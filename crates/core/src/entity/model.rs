use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::key::Key;
use crate::store::{ConnectOptions, Connector, Datastore, Record};
use crate::value::{Attribute, FromValue, PropertyMap, TaggedValue, Value};

use super::{EntityError, Model, Result, Schema};

/// How an entity obtains its store client.
#[derive(Clone)]
pub enum Connection {
    /// Use an already established client.
    Client(Arc<dyn Datastore>),
    /// Build no client now; call [`Entity::connect`] later.
    Deferred,
}

impl Connection {
    pub fn client(store: impl Datastore + 'static) -> Self {
        Connection::Client(Arc::new(store))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Client(_) => f.write_str("Connection::Client"),
            Connection::Deferred => f.write_str("Connection::Deferred"),
        }
    }
}

/// An instance of a declared model, mapped to a stored entity.
///
/// Attributes are either tagged (persistable) or raw. The property lookup is
/// the ordered list of attribute names written on the next save; it starts
/// as the tagged attributes of the schema and is replaced by the stored
/// property names whenever a record is applied.
#[derive(Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    kind: String,
    attributes: Vec<(String, Attribute)>,
    lookup: Vec<String>,
    key: Option<Key>,
    client: Option<Arc<dyn Datastore>>,
}

impl Entity {
    /// Creates an entity from a schema.
    ///
    /// Fails with [`EntityError::MissingKind`] when the schema names no kind.
    pub fn new(schema: Schema, connection: Connection) -> Result<Self> {
        let kind = schema.validate()?.to_string();
        let client = match connection {
            Connection::Client(client) => Some(client),
            Connection::Deferred => None,
        };
        Ok(Self::from_parts(Arc::new(schema), kind, client))
    }

    /// Creates an entity of a [`Model`] type.
    pub fn of<M: Model>(connection: Connection) -> Result<Self> {
        Self::new(M::schema(), connection)
    }

    /// Validates the schema, then connects through `connector`.
    pub async fn connected(
        schema: Schema,
        connector: &dyn Connector,
        options: &ConnectOptions,
    ) -> Result<Self> {
        let mut entity = Self::new(schema, Connection::Deferred)?;
        entity.connect(connector, options).await?;
        Ok(entity)
    }

    fn from_parts(schema: Arc<Schema>, kind: String, client: Option<Arc<dyn Datastore>>) -> Self {
        let attributes = schema
            .fields()
            .iter()
            .map(|field| {
                let attribute = if field.persisted {
                    Attribute::Tagged(TaggedValue::new(field.default.clone()))
                } else {
                    Attribute::Raw(field.default.clone())
                };
                (field.name.clone(), attribute)
            })
            .collect::<Vec<_>>();
        let lookup = attributes
            .iter()
            .filter(|(_, attribute)| attribute.is_tagged())
            .map(|(name, _)| name.clone())
            .collect();

        Self {
            schema,
            kind,
            attributes,
            lookup,
            key: None,
            client,
        }
    }

    /// A fresh instance of the same model sharing this entity's client.
    pub fn blank(&self) -> Self {
        Self::from_parts(
            Arc::clone(&self.schema),
            self.kind.clone(),
            self.client.clone(),
        )
    }

    /// A fresh instance populated from a stored record.
    pub fn materialize(&self, record: Record) -> Self {
        let mut entity = self.blank();
        entity.apply_record(record.properties, record.key);
        entity
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Establishes a store client for a deferred entity.
    pub async fn connect(
        &mut self,
        connector: &dyn Connector,
        options: &ConnectOptions,
    ) -> Result<()> {
        let client = connector.connect(options).await?;
        tracing::debug!(kind = %self.kind, namespace = ?client.namespace(), "Entity connected");
        self.client = Some(client);
        Ok(())
    }

    pub fn set_client(&mut self, client: Arc<dyn Datastore>) {
        self.client = Some(client);
    }

    pub fn client(&self) -> Option<&Arc<dyn Datastore>> {
        self.client.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub(crate) fn require_client(&self) -> Result<Arc<dyn Datastore>> {
        self.client.clone().ok_or(EntityError::NotConnected)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Option<Key>) {
        self.key = key;
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|(n, _)| n == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.position(name).map(|i| &self.attributes[i].1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes
            .iter()
            .map(|(name, attribute)| (name.as_str(), attribute))
    }

    /// Value of an attribute, unwrapped from its tag.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attribute(name).map(Attribute::value)
    }

    /// Typed value of an attribute; `None` when absent or of another type.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(T::from_value)
    }

    /// Sets a raw attribute value.
    ///
    /// A name already in the lookup stays persisted; a new name does not
    /// join the lookup.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.set_attribute(name.into(), Attribute::Raw(value.into()));
    }

    /// Sets a tagged attribute, which joins the lookup on the next recompute.
    pub fn set_tagged(&mut self, name: impl Into<String>, value: TaggedValue) {
        self.set_attribute(name.into(), Attribute::Tagged(value));
    }

    fn set_attribute(&mut self, name: String, attribute: Attribute) {
        match self.position(&name) {
            Some(i) => self.attributes[i].1 = attribute,
            None => self.attributes.push((name, attribute)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.position(name).map(|i| self.attributes.remove(i).1)
    }

    /// Turns a tagged attribute into a raw one so recomputes skip it.
    pub(crate) fn demote(&mut self, name: &str) {
        if let Some(i) = self.position(name) {
            if let Attribute::Tagged(tagged) = &self.attributes[i].1 {
                self.attributes[i].1 = Attribute::Raw(tagged.value.clone());
            }
        }
    }

    // ========================================================================
    // Property lookup
    // ========================================================================

    /// The lookup as of the last recompute.
    pub fn property_lookup(&self) -> &[String] {
        &self.lookup
    }

    /// Computes the lookup without storing it.
    ///
    /// Existing names are kept while their attribute exists; tagged
    /// attributes not yet listed are appended in attribute order.
    pub fn computed_lookup(&self) -> Vec<String> {
        let mut lookup: Vec<String> = self
            .lookup
            .iter()
            .filter(|name| self.position(name).is_some())
            .cloned()
            .collect();
        for (name, attribute) in &self.attributes {
            if attribute.is_tagged() && !lookup.contains(name) {
                lookup.push(name.clone());
            }
        }
        lookup
    }

    pub fn refresh_lookup(&mut self) -> &[String] {
        self.lookup = self.computed_lookup();
        &self.lookup
    }

    pub(crate) fn lookup_mut(&mut self) -> &mut Vec<String> {
        &mut self.lookup
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Recomputes the lookup and returns the persisted attributes as a
    /// property map, in lookup order.
    pub fn to_map(&mut self) -> PropertyMap {
        self.refresh_lookup();
        self.collect_properties(&self.lookup)
    }

    fn collect_properties(&self, lookup: &[String]) -> PropertyMap {
        lookup
            .iter()
            .filter_map(|name| self.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }

    /// Overwrites attributes from a stored property map and takes its key.
    ///
    /// The lookup becomes exactly the map's property names.
    pub fn apply_record(&mut self, properties: PropertyMap, key: Key) {
        let mut lookup = Vec::with_capacity(properties.len());
        for (name, value) in properties {
            lookup.push(name.clone());
            self.set_attribute(name, Attribute::Raw(value));
        }
        self.lookup = lookup;
        self.key = Some(key);
    }

    /// Deserializes the persisted attributes into a struct.
    pub fn to_struct<T: DeserializeOwned>(&self) -> Result<T> {
        let properties = self.collect_properties(&self.computed_lookup());
        serde_json::from_value(crate::value::map_to_json(&properties))
            .map_err(|e| EntityError::Serialization(e.to_string()))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Entity Kind: '{}' ==> [{}]>",
            self.kind,
            self.lookup.join(", ")
        )
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("lookup", &self.lookup)
            .field("attributes", &self.attributes)
            .field("connected", &self.client.is_some())
            .finish()
    }
}
