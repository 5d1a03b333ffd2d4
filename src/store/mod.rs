//! Backend primitives for the catalog (products, access codes, image blobs).
//!
//! `CatalogStore` is the seam between business logic and the hosted backend.
//! Implementations carry no business rules: they list, insert and delete rows
//! and store blobs. The one contract that matters is `consume_access_code`,
//! which must be a single conditional delete whose affected-row count is the
//! only source of truth for success.

pub mod local_blobs;
pub mod memory;

pub use local_blobs::LocalBlobDir;
pub use memory::MemoryStore;

use crate::database::DatabaseStore;
use crate::error::AppResult;
use crate::external::SupabaseStore;
use crate::models::{AccessCode, NewProduct, Product};
use std::future::Future;

pub trait CatalogStore: Send + Sync + 'static {
    fn list_products(&self) -> impl Future<Output = AppResult<Vec<Product>>> + Send;

    fn list_access_codes(&self) -> impl Future<Output = AppResult<Vec<AccessCode>>> + Send;

    fn insert_product(&self, product: NewProduct)
    -> impl Future<Output = AppResult<Product>> + Send;

    /// Removes the row only, never the image blob.
    fn delete_product(&self, id: i64) -> impl Future<Output = AppResult<()>> + Send;

    /// Fails with `DuplicateOrPersist` when the code already exists.
    fn insert_access_code(&self, code: &str)
    -> impl Future<Output = AppResult<AccessCode>> + Send;

    fn delete_access_code(&self, id: i64) -> impl Future<Output = AppResult<()>> + Send;

    /// Deletes the row whose code matches exactly; true iff exactly one row was removed.
    fn consume_access_code(&self, code: &str) -> impl Future<Output = AppResult<bool>> + Send;

    /// Stores a blob and returns its publicly fetchable URL.
    fn put_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = AppResult<String>> + Send;
}

/// Runtime-selected backend.
#[derive(Clone)]
pub enum CatalogBackend {
    Supabase(SupabaseStore),
    Postgres(DatabaseStore),
    Memory(MemoryStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            CatalogBackend::Supabase($store) => $call.await,
            CatalogBackend::Postgres($store) => $call.await,
            CatalogBackend::Memory($store) => $call.await,
        }
    };
}

impl CatalogBackend {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogBackend::Supabase(_) => "supabase",
            CatalogBackend::Postgres(_) => "postgres",
            CatalogBackend::Memory(_) => "memory",
        }
    }

    /// Reads a blob kept by this process. The hosted backend serves its own
    /// blobs, so it always answers `None`.
    pub async fn local_image(&self, name: &str) -> AppResult<Option<Vec<u8>>> {
        match self {
            CatalogBackend::Supabase(_) => Ok(None),
            CatalogBackend::Postgres(store) => store.blobs().read(name).await,
            CatalogBackend::Memory(store) => Ok(store.image(name).await),
        }
    }
}

impl CatalogStore for CatalogBackend {
    async fn list_products(&self) -> AppResult<Vec<Product>> {
        dispatch!(self, s => s.list_products())
    }

    async fn list_access_codes(&self) -> AppResult<Vec<AccessCode>> {
        dispatch!(self, s => s.list_access_codes())
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        dispatch!(self, s => s.insert_product(product))
    }

    async fn delete_product(&self, id: i64) -> AppResult<()> {
        dispatch!(self, s => s.delete_product(id))
    }

    async fn insert_access_code(&self, code: &str) -> AppResult<AccessCode> {
        dispatch!(self, s => s.insert_access_code(code))
    }

    async fn delete_access_code(&self, id: i64) -> AppResult<()> {
        dispatch!(self, s => s.delete_access_code(id))
    }

    async fn consume_access_code(&self, code: &str) -> AppResult<bool> {
        dispatch!(self, s => s.consume_access_code(code))
    }

    async fn put_image(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        dispatch!(self, s => s.put_image(name, bytes, content_type))
    }
}
