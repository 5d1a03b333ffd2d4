use crate::error::{AppError, AppResult};
use crate::models::{AccessCode, NewProduct, Product};
use crate::store::CatalogStore;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    access_codes: Vec<AccessCode>,
    images: HashMap<String, Vec<u8>>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Process-local catalog. Every operation runs under one lock, so
/// consumption is atomic across concurrent callers.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    offline: Arc<AtomicBool>,
    public_base_url: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory://images")
    }
}

impl MemoryStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            offline: Arc::new(AtomicBool::new(false)),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Simulates an unreachable backend: every call fails with `Transport`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn image(&self, name: &str) -> Option<Vec<u8>> {
        self.tables.lock().await.images.get(name).cloned()
    }

    fn ensure_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Transport("memory store is offline".into()));
        }
        Ok(())
    }
}

impl CatalogStore for MemoryStore {
    async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.ensure_online()?;
        Ok(self.tables.lock().await.products.clone())
    }

    async fn list_access_codes(&self) -> AppResult<Vec<AccessCode>> {
        self.ensure_online()?;
        Ok(self.tables.lock().await.access_codes.clone())
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let row = Product {
            id: tables.next_id(),
            title: product.title,
            image_url: product.image_url,
        };
        tables.products.push(row.clone());
        Ok(row)
    }

    async fn delete_product(&self, id: i64) -> AppResult<()> {
        self.ensure_online()?;
        self.tables.lock().await.products.retain(|p| p.id != id);
        Ok(())
    }

    async fn insert_access_code(&self, code: &str) -> AppResult<AccessCode> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        if tables.access_codes.iter().any(|c| c.code == code) {
            return Err(AppError::DuplicateOrPersist(format!(
                "access code {code} already exists"
            )));
        }
        let row = AccessCode {
            id: tables.next_id(),
            code: code.to_string(),
        };
        tables.access_codes.push(row.clone());
        Ok(row)
    }

    async fn delete_access_code(&self, id: i64) -> AppResult<()> {
        self.ensure_online()?;
        self.tables.lock().await.access_codes.retain(|c| c.id != id);
        Ok(())
    }

    async fn consume_access_code(&self, code: &str) -> AppResult<bool> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let before = tables.access_codes.len();
        tables.access_codes.retain(|c| c.code != code);
        Ok(before - tables.access_codes.len() == 1)
    }

    async fn put_image(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> AppResult<String> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        match tables.images.entry(name.to_string()) {
            Entry::Occupied(_) => Err(AppError::Upload(format!("object {name} already exists"))),
            Entry::Vacant(slot) => {
                slot.insert(bytes);
                Ok(format!("{}/{}", self.public_base_url, name))
            }
        }
    }
}
