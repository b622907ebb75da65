//! Storage encodings for keys.
//!
//! Pure functions shared by the store backends. An encoded path keeps the
//! property that a descendant's storage key starts with its ancestor's
//! [`ancestor_prefix`], so hierarchy queries reduce to prefix scans.

use super::{Key, KeyError, KeyId, PathElement};

// ============================================================================
// Separators and prefixes
// ============================================================================

pub const NAMESPACE_SEPARATOR: char = '|';
pub const PATH_SEPARATOR: char = '/';
pub const KIND_SEPARATOR: char = ':';
pub const ID_PREFIX: char = 'i';
pub const NAME_PREFIX: char = 's';

// ============================================================================
// Encoding
// ============================================================================

/// Encode one complete path element.
///
/// Pattern: `<kind>:i<id padded to 19 digits>` or `<kind>:s<name>`, with kind
/// and name percent-encoded. Padding keeps numeric ids in numeric order.
pub fn encode_element(element: &PathElement) -> Result<String, KeyError> {
    element.validate()?;
    let kind = urlencoding::encode(&element.kind);
    match &element.id {
        Some(KeyId::Id(id)) => Ok(format!("{kind}{KIND_SEPARATOR}{ID_PREFIX}{id:019}")),
        Some(KeyId::Name(name)) => Ok(format!(
            "{kind}{KIND_SEPARATOR}{NAME_PREFIX}{}",
            urlencoding::encode(name)
        )),
        None => Err(KeyError::Incomplete(element.kind.clone())),
    }
}

/// Encode the path of a complete key, without its namespace.
///
/// Pattern: `<element>/<element>/...`
pub fn encode_path(key: &Key) -> Result<String, KeyError> {
    let segments = key
        .path()
        .iter()
        .map(encode_element)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments.join(&PATH_SEPARATOR.to_string()))
}

/// Encode the namespace part of a storage key.
///
/// Pattern: `<namespace>|` (just `|` for the default namespace)
pub fn namespace_prefix(namespace: Option<&str>) -> String {
    let namespace = namespace.map(urlencoding::encode).unwrap_or_default();
    format!("{namespace}{NAMESPACE_SEPARATOR}")
}

/// Generate the storage key of a complete key.
///
/// Pattern: `<namespace>|<path>`
pub fn storage_key(key: &Key) -> Result<String, KeyError> {
    Ok(format!(
        "{}{}",
        namespace_prefix(key.namespace()),
        encode_path(key)?
    ))
}

/// Generate the prefix shared by the storage keys of all descendants.
///
/// Pattern: `<namespace>|<path>/`
pub fn ancestor_prefix(key: &Key) -> Result<String, KeyError> {
    Ok(format!("{}{PATH_SEPARATOR}", storage_key(key)?))
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one path element produced by [`encode_element`].
pub fn decode_element(encoded: &str) -> Result<PathElement, KeyError> {
    let (kind, id) = encoded
        .split_once(KIND_SEPARATOR)
        .ok_or_else(|| KeyError::Malformed(format!("missing kind separator in '{encoded}'")))?;
    let kind = decode_text(kind)?;

    let id = if let Some(digits) = id.strip_prefix(ID_PREFIX) {
        let id = digits
            .parse::<i64>()
            .map_err(|_| KeyError::Malformed(format!("invalid id '{digits}'")))?;
        KeyId::Id(id)
    } else if let Some(name) = id.strip_prefix(NAME_PREFIX) {
        KeyId::Name(decode_text(name)?)
    } else {
        return Err(KeyError::Malformed(format!("unknown id marker in '{encoded}'")));
    };

    let element = PathElement::new(kind, Some(id));
    element.validate()?;
    Ok(element)
}

/// Decode a path produced by [`encode_path`] into a key in `namespace`.
pub fn decode_path(encoded: &str, namespace: Option<String>) -> Result<Key, KeyError> {
    let path = encoded
        .split(PATH_SEPARATOR)
        .map(decode_element)
        .collect::<Result<Vec<_>, _>>()?;
    Key::from_elements(namespace, path)
}

/// Decode a storage key produced by [`storage_key`].
pub fn parse_storage_key(encoded: &str) -> Result<Key, KeyError> {
    let (namespace, path) = encoded
        .split_once(NAMESPACE_SEPARATOR)
        .ok_or_else(|| KeyError::Malformed("missing namespace separator".to_string()))?;
    let namespace = decode_text(namespace)?;
    decode_path(path, Some(namespace))
}

fn decode_text(encoded: &str) -> Result<String, KeyError> {
    urlencoding::decode(encoded)
        .map(|text| text.into_owned())
        .map_err(|e| KeyError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::PathPart;

    fn user_key() -> Key {
        Key::from_path([PathPart::from("Parent"), 7.into(), "User".into(), "bob".into()]).unwrap()
    }

    #[test]
    fn test_encode_element_pads_ids() {
        let element = PathElement::new("User", Some(KeyId::Id(42)));
        assert_eq!(
            encode_element(&element).unwrap(),
            "User:i0000000000000000042"
        );
    }

    #[test]
    fn test_encode_element_escapes_names() {
        let element = PathElement::new("User", Some(KeyId::Name("a/b:c".to_string())));
        assert_eq!(encode_element(&element).unwrap(), "User:sa%2Fb%3Ac");
    }

    #[test]
    fn test_encode_element_rejects_incomplete() {
        let element = PathElement::new("User", None);
        assert!(matches!(
            encode_element(&element),
            Err(KeyError::Incomplete(_))
        ));
    }

    #[test]
    fn test_storage_key_default_namespace() {
        assert_eq!(
            storage_key(&user_key()).unwrap(),
            "|Parent:i0000000000000000007/User:sbob"
        );
    }

    #[test]
    fn test_storage_key_with_namespace() {
        let key = Key::with_id("User", 1).in_namespace(Some("my ns".to_string()));
        assert_eq!(
            storage_key(&key).unwrap(),
            "my%20ns|User:i0000000000000000001"
        );
    }

    #[test]
    fn test_ancestor_prefix_matches_descendants() {
        let parent = Key::with_id("Parent", 7);
        let prefix = ancestor_prefix(&parent).unwrap();
        assert!(storage_key(&user_key()).unwrap().starts_with(&prefix));

        let sibling = Key::with_id("Parent", 70).child("User", Some(1.into())).unwrap();
        assert!(!storage_key(&sibling).unwrap().starts_with(&prefix));
    }

    #[test]
    fn test_numeric_ids_sort_numerically() {
        let nine = storage_key(&Key::with_id("User", 9)).unwrap();
        let ten = storage_key(&Key::with_id("User", 10)).unwrap();
        assert!(nine < ten);
    }

    #[test]
    fn test_parse_storage_key_round_trip() {
        let key = user_key().in_namespace(Some("tests".to_string()));
        let encoded = storage_key(&key).unwrap();
        assert_eq!(parse_storage_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_parse_storage_key_malformed() {
        assert!(matches!(
            parse_storage_key("User:i1"),
            Err(KeyError::Malformed(_))
        ));
        assert!(matches!(
            parse_storage_key("|User:x1"),
            Err(KeyError::Malformed(_))
        ));
    }
}
