pub mod catalog_store;
pub mod connection;

pub use catalog_store::DatabaseStore;
pub use connection::{create_pool, run_migrations};
