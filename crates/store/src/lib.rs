//! Database access (read and write) abstractions for the doggy date backend.

mod doggy_store;
mod error;
pub mod models;
mod schema;
mod store;

pub use doggy_common_types::Table;
pub use doggy_store::DoggyStore;
pub use error::{BoxError, StoreError};
pub use store::Store;
