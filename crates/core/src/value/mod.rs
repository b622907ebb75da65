mod convert;
mod map;
mod tagged;
mod types;

pub use convert::{map_to_json, FromValue};
pub use map::PropertyMap;
pub use tagged::{Attribute, TaggedValue};
pub use types::Value;
