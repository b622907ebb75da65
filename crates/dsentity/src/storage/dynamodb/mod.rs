//! DynamoDB storage backend.
//!
//! Implements `Datastore` using `aws-sdk-dynamodb`. Expects a table with a
//! `PK` string hash key and a `KindIndex` GSI (`KIND_NS` hash key, `PK`
//! range key, all attributes projected).

mod conversions;
mod error;
mod expressions;
mod keys;
mod store;

pub use store::{DynamoDbSettings, DynamoDbStore};
