mod cursor;
mod error;
mod matching;
mod traits;
mod types;

pub use cursor::Cursor;
pub use error::{Result, StoreError};
pub use matching::{collect_page, filter_matches, record_matches};
pub use traits::{Connector, Datastore};
pub use types::{
    ConnectOptions, Filter, Operator, Query, QueryPage, Record, MAX_QUERY_LIMIT,
};
