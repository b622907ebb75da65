use crate::key::{Key, KeyId};
use crate::store::{Cursor, MAX_QUERY_LIMIT};
use crate::value::{PropertyMap, Value};

/// Options for [`Entity::save`](super::Entity::save).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOptions {
    pub id: Option<KeyId>,
    pub parent: Option<Key>,
    pub extra_props: PropertyMap,
    pub excludes: Vec<String>,
    /// Keep `extra_props` and `excludes` on the instance after the save.
    pub retain_field_changes: bool,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<KeyId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn parent(mut self, parent: Key) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn extra_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_props.insert(name, value);
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excludes.push(name.into());
        self
    }

    pub fn retain_field_changes(mut self, retain: bool) -> Self {
        self.retain_field_changes = retain;
        self
    }
}

/// Options for [`Entity::get_objects`](super::Entity::get_objects).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub limit: usize,
    pub paginate: bool,
    pub cursor: Option<Cursor>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            limit: MAX_QUERY_LIMIT,
            paginate: false,
            cursor: None,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn paginate(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// A page of materialized results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; always `None` unless pagination was requested.
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}
