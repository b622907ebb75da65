//! The entity model: declared schemas, instances mapped to stored records,
//! and the store operations on them.

mod error;
mod model;
mod operations;
mod options;
mod schema;

#[cfg(test)]
mod test_support;

pub use error::{EntityError, Result};
pub use model::{Connection, Entity};
pub use operations::ACTIVE_PROPERTY;
pub use options::{FetchOptions, Page, SaveOptions};
pub use schema::{FieldDef, Model, Schema};
