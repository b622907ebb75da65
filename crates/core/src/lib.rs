//! Core types of the dsentity datastore layer.
//!
//! Pure types and traits only: values and keys, records and queries, the
//! [`Datastore`] client seam and the [`Entity`] model built on top of it.
//! Store backends live in the `dsentity` crate.

pub mod entity;
pub mod key;
pub mod store;
pub mod value;

pub use entity::{
    Connection, Entity, EntityError, FetchOptions, FieldDef, Model, Page, SaveOptions, Schema,
};
pub use key::{Key, KeyError, KeyId, PathElement, PathPart};
pub use store::{
    ConnectOptions, Connector, Cursor, Datastore, Filter, Operator, Query, QueryPage, Record,
    StoreError,
};
pub use value::{map_to_json, Attribute, FromValue, PropertyMap, TaggedValue, Value};
