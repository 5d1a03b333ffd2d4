use crate::entities::{access_code_entity as access_codes, product_entity as products};
use crate::error::{AppError, AppResult};
use crate::models::{AccessCode, NewProduct, Product};
use crate::store::{CatalogStore, LocalBlobDir};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};

/// Self-hosted catalog on Postgres, with images on local disk.
#[derive(Clone)]
pub struct DatabaseStore {
    pool: DatabaseConnection,
    blobs: LocalBlobDir,
}

impl DatabaseStore {
    pub fn new(pool: DatabaseConnection, blobs: LocalBlobDir) -> Self {
        Self { pool, blobs }
    }

    pub fn blobs(&self) -> &LocalBlobDir {
        &self.blobs
    }
}

impl CatalogStore for DatabaseStore {
    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let rows = products::Entity::find()
            .order_by_asc(products::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_access_codes(&self) -> AppResult<Vec<AccessCode>> {
        let rows = access_codes::Entity::find()
            .order_by_asc(access_codes::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        let model = products::ActiveModel {
            title: Set(product.title),
            image_url: Set(product.image_url),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(model.into())
    }

    async fn delete_product(&self, id: i64) -> AppResult<()> {
        products::Entity::delete_by_id(id).exec(&self.pool).await?;
        Ok(())
    }

    async fn insert_access_code(&self, code: &str) -> AppResult<AccessCode> {
        let inserted = access_codes::ActiveModel {
            code: Set(code.to_string()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(model) => Ok(model.into()),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(detail)) => {
                    Err(AppError::DuplicateOrPersist(detail))
                }
                _ => Err(err.into()),
            },
        }
    }

    async fn delete_access_code(&self, id: i64) -> AppResult<()> {
        access_codes::Entity::delete_by_id(id)
            .exec(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume_access_code(&self, code: &str) -> AppResult<bool> {
        // single DELETE ... WHERE code = $1; the unique index caps it at one row
        let result = access_codes::Entity::delete_many()
            .filter(access_codes::Column::Code.eq(code))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn put_image(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> AppResult<String> {
        self.blobs.put(name, &bytes).await
    }
}
