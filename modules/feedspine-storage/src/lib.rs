mod error;
mod filter;
mod memory;
mod postgres;
#[cfg(feature = "test-utils")]
pub mod testutil;
mod traits;

pub use error::{Result, StorageError};
pub use filter::{extract, matches, FilterOp, Filters};
pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::{OnConflict, QuerySpec, Storage};
