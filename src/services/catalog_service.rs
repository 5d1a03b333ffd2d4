use crate::error::{AppError, AppResult};
use crate::models::{AccessCode, NewProduct, Product};
use crate::store::CatalogStore;
use crate::utils::{content_type_for, file_extension, generate_access_code, object_name};
use chrono::Utc;
use std::sync::Arc;

const MAX_BATCH: u32 = 500;
const GENERATE_ATTEMPTS: usize = 5;

/// Catalog operations used by the admin screen and the draw.
pub struct CatalogService<S> {
    store: Arc<S>,
}

impl<S> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.store.list_products().await
    }

    pub async fn list_access_codes(&self) -> AppResult<Vec<AccessCode>> {
        self.store.list_access_codes().await
    }

    /// Uploads the image, then inserts the product row pointing at it.
    ///
    /// A failed insert leaves the uploaded blob behind; it is logged, not removed.
    pub async fn create_product(
        &self,
        title: &str,
        image: Vec<u8>,
        file_name: &str,
    ) -> AppResult<Product> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Product title is required".into()));
        }
        if image.is_empty() {
            return Err(AppError::ValidationError("Product image is required".into()));
        }

        let name = object_name(Utc::now().timestamp_millis(), file_name);
        let content_type = content_type_for(&file_extension(file_name));

        let image_url = self
            .store
            .put_image(&name, image, content_type)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        let product = self
            .store
            .insert_product(NewProduct {
                title: title.to_string(),
                image_url: image_url.clone(),
            })
            .await
            .map_err(|e| {
                log::warn!("Product insert failed, image {image_url} is orphaned");
                AppError::Persist(e.to_string())
            })?;

        log::info!("Registered product {} ({})", product.id, product.title);
        Ok(product)
    }

    /// Deletes the row only; the image blob stays in storage.
    pub async fn delete_product(&self, id: i64) -> AppResult<()> {
        self.store.delete_product(id).await?;
        log::info!("Deleted product {id}");
        Ok(())
    }

    /// Stores the given code, or a generated one when it is missing or blank.
    pub async fn create_access_code(&self, code: Option<&str>) -> AppResult<AccessCode> {
        match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => self.insert_code(code).await,
            None => self.insert_generated_code().await,
        }
    }

    /// Generates `count` fresh codes. Collisions with existing codes are skipped.
    pub async fn issue_access_codes(&self, count: u32) -> AppResult<(Vec<AccessCode>, u32)> {
        if count == 0 || count > MAX_BATCH {
            return Err(AppError::ValidationError(format!(
                "count must be between 1 and {MAX_BATCH}"
            )));
        }

        let mut issued = Vec::with_capacity(count as usize);
        let mut skipped = 0;
        for _ in 0..count {
            match self.insert_code(&generate_access_code()).await {
                Ok(code) => issued.push(code),
                Err(AppError::DuplicateOrPersist(msg)) => {
                    log::debug!("Skipping colliding generated code: {msg}");
                    skipped += 1;
                }
                Err(e) => {
                    log::error!("Batch issue stopped after {} codes: {e}", issued.len());
                    return Err(e);
                }
            }
        }

        log::info!("Issued {} access codes ({skipped} skipped)", issued.len());
        Ok((issued, skipped))
    }

    pub async fn delete_access_code(&self, id: i64) -> AppResult<()> {
        self.store.delete_access_code(id).await
    }

    /// See [`CatalogStore::consume_access_code`].
    pub async fn consume_access_code(&self, code: &str) -> AppResult<bool> {
        self.store.consume_access_code(code).await
    }

    async fn insert_code(&self, code: &str) -> AppResult<AccessCode> {
        self.store
            .insert_access_code(code)
            .await
            .map_err(|e| match e {
                AppError::DuplicateOrPersist(_) => e,
                other => AppError::DuplicateOrPersist(other.to_string()),
            })
    }

    async fn insert_generated_code(&self) -> AppResult<AccessCode> {
        let mut last_err = None;
        for _ in 0..GENERATE_ATTEMPTS {
            match self.insert_code(&generate_access_code()).await {
                Ok(code) => return Ok(code),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AppError::InternalError("could not generate an access code".into())
        }))
    }
}
