use std::fmt;

use serde::{Deserialize, Serialize};

use super::KeyError;

/// Identifier part of a key path element: a store-assigned numeric id or a
/// caller-chosen name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyId {
    Id(i64),
    Name(String),
}

impl KeyId {
    /// Returns the numeric id, if this is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            KeyId::Id(id) => Some(*id),
            KeyId::Name(_) => None,
        }
    }

    /// Returns the name, if this is one.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            KeyId::Id(_) => None,
            KeyId::Name(name) => Some(name),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), KeyError> {
        match self {
            KeyId::Id(id) if *id <= 0 => Err(KeyError::InvalidId(*id)),
            KeyId::Name(name) if name.is_empty() => Err(KeyError::EmptyName),
            _ => Ok(()),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Id(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{id}"),
            KeyId::Name(name) => write!(f, "{name}"),
        }
    }
}

/// One `(kind, id)` step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    pub id: Option<KeyId>,
}

impl PathElement {
    pub fn new(kind: impl Into<String>, id: Option<KeyId>) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), KeyError> {
        if self.kind.is_empty() {
            return Err(KeyError::EmptyKind);
        }
        match &self.id {
            Some(id) => id.validate(),
            None => Ok(()),
        }
    }
}

/// A raw segment of a key path as supplied by callers, e.g. `["User", 5]`.
///
/// Segments alternate kind, id, kind, id... A trailing kind without an id
/// yields an incomplete key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Text(String),
    Id(i64),
}

impl PathPart {
    /// Parses a command-line segment: positive integers become ids,
    /// everything else is text.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(id) if id > 0 => PathPart::Id(id),
            _ => PathPart::Text(segment.to_string()),
        }
    }
}

impl From<&str> for PathPart {
    fn from(text: &str) -> Self {
        PathPart::Text(text.to_string())
    }
}

impl From<String> for PathPart {
    fn from(text: String) -> Self {
        PathPart::Text(text)
    }
}

impl From<i64> for PathPart {
    fn from(id: i64) -> Self {
        PathPart::Id(id)
    }
}

impl From<KeyId> for PathPart {
    fn from(id: KeyId) -> Self {
        match id {
            KeyId::Id(id) => PathPart::Id(id),
            KeyId::Name(name) => PathPart::Text(name),
        }
    }
}

/// Identity handle of a stored entity.
///
/// A key is a non-empty path of `(kind, id)` elements, optionally scoped to a
/// namespace. Every element but the last must carry an id; a key whose last
/// element has no id is incomplete and gets its id from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    namespace: Option<String>,
    path: Vec<PathElement>,
}

impl Key {
    /// Creates an incomplete key of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::new(kind, None)],
        }
    }

    /// Creates a complete top-level key.
    pub fn with_id(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::new(kind, Some(id.into()))],
        }
    }

    /// Builds a key from alternating kind/id segments.
    pub fn from_path<I, P>(parts: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPart>,
    {
        let mut path = Vec::new();
        let mut parts = parts.into_iter().map(Into::into);

        while let Some(kind_part) = parts.next() {
            let kind = match kind_part {
                PathPart::Text(kind) => kind,
                PathPart::Id(id) => return Err(KeyError::KindNotText(id)),
            };
            let id = parts.next().map(|part| match part {
                PathPart::Text(name) => KeyId::Name(name),
                PathPart::Id(id) => KeyId::Id(id),
            });
            let element = PathElement::new(kind, id);
            element.validate()?;
            path.push(element);
        }

        if path.is_empty() {
            return Err(KeyError::EmptyPath);
        }

        Ok(Self {
            namespace: None,
            path,
        })
    }

    /// Builds a key from already-structured path elements.
    pub fn from_elements(
        namespace: Option<String>,
        path: Vec<PathElement>,
    ) -> Result<Self, KeyError> {
        if path.is_empty() {
            return Err(KeyError::EmptyPath);
        }
        for (position, element) in path.iter().enumerate() {
            element.validate()?;
            if element.id.is_none() && position + 1 < path.len() {
                return Err(KeyError::Incomplete(element.kind.clone()));
            }
        }
        Ok(Self {
            namespace: normalize_namespace(namespace),
            path,
        })
    }

    /// Sets the namespace. Empty namespaces are treated as the default one.
    pub fn in_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = normalize_namespace(namespace);
        self
    }

    /// Creates a child key below this one. The parent must be complete.
    pub fn child(&self, kind: impl Into<String>, id: Option<KeyId>) -> Result<Self, KeyError> {
        if !self.is_complete() {
            return Err(KeyError::Incomplete(self.to_string()));
        }
        let element = PathElement::new(kind, id);
        element.validate()?;

        let mut path = self.path.clone();
        path.push(element);
        Ok(Self {
            namespace: self.namespace.clone(),
            path,
        })
    }

    /// Returns a copy of this incomplete key with its last id filled in.
    pub fn completed(&self, id: i64) -> Result<Self, KeyError> {
        if self.is_complete() {
            return Err(KeyError::AlreadyComplete(self.to_string()));
        }
        let id = KeyId::Id(id);
        id.validate()?;

        let mut key = self.clone();
        if let Some(last) = key.path.last_mut() {
            last.id = Some(id);
        }
        Ok(key)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    /// Kind of the entity this key identifies (the last path element).
    pub fn kind(&self) -> &str {
        self.path.last().map(|e| e.kind.as_str()).unwrap_or_default()
    }

    pub fn id(&self) -> Option<&KeyId> {
        self.path.last().and_then(|e| e.id.as_ref())
    }

    pub fn is_complete(&self) -> bool {
        self.id().is_some()
    }

    /// Returns the parent key, if this key has one.
    pub fn parent(&self) -> Option<Self> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Self {
            namespace: self.namespace.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// True when `other` lives strictly below this key in the same namespace.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        self.namespace == other.namespace
            && other.path.len() > self.path.len()
            && other.path.starts_with(&self.path)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}|")?;
        }
        for (position, element) in self.path.iter().enumerate() {
            if position > 0 {
                write!(f, "/")?;
            }
            match &element.id {
                Some(id) => write!(f, "{}:{}", element.kind, id)?,
                None => write!(f, "{}", element.kind)?,
            }
        }
        Ok(())
    }
}

fn normalize_namespace(namespace: Option<String>) -> Option<String> {
    namespace.filter(|ns| !ns.is_empty())
}
