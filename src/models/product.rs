use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::product_entity;

/// A prize item that can be drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub title: String,
    /// Publicly fetchable image URL
    pub image_url: String,
}

/// Row payload for inserting a product; the id is assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    pub image_url: String,
}

impl From<product_entity::Model> for Product {
    fn from(m: product_entity::Model) -> Self {
        Product {
            id: m.id,
            title: m.title,
            image_url: m.image_url,
        }
    }
}

/// Query parameters of the product upload route; the image bytes are the request body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateProductQuery {
    pub title: String,
    /// Original file name, used for its extension
    pub file_name: String,
}
