mod encoding;
mod error;
mod types;

pub use encoding::{
    ancestor_prefix, decode_element, decode_path, encode_element, encode_path, namespace_prefix,
    parse_storage_key, storage_key,
};
pub use error::KeyError;
pub use types::{Key, KeyId, PathElement, PathPart};
