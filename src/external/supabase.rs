use crate::config::SupabaseConfig;
use crate::error::{AppError, AppResult};
use crate::models::{AccessCode, NewProduct, Product};
use crate::store::CatalogStore;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// PostgREST error body
#[derive(Debug, Default, Deserialize)]
struct RestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

const UNIQUE_VIOLATION: &str = "23505";

/// Catalog hosted on Supabase: rows through PostgREST, images through Storage.
#[derive(Clone)]
pub struct SupabaseStore {
    http: Client,
    cfg: SupabaseConfig,
}

impl SupabaseStore {
    pub fn new(cfg: SupabaseConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("raffle-backend/supabase")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    fn base_url(&self) -> &str {
        self.cfg.url.trim_end_matches('/')
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url(), table)
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url(),
            self.cfg.image_bucket,
            name
        )
    }

    pub fn public_object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url(),
            self.cfg.image_bucket,
            name
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.cfg.anon_key)
            .bearer_auth(&self.cfg.anon_key)
    }

    /// Passes successful responses through and turns the rest into errors.
    async fn check(resp: Response, what: &str) -> AppResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let body: RestError = serde_json::from_str(&text).unwrap_or_default();
        let message = body
            .message
            .or(body.details)
            .unwrap_or_else(|| text.clone());

        if status == StatusCode::CONFLICT || body.code.as_deref() == Some(UNIQUE_VIOLATION) {
            return Err(AppError::DuplicateOrPersist(message));
        }

        log::error!("Supabase {what} failed: HTTP {}: {message}", status.as_u16());
        Err(AppError::Transport(format!(
            "{what} failed: HTTP {}: {message}",
            status.as_u16()
        )))
    }

    async fn select_all<T: serde::de::DeserializeOwned>(&self, table: &str) -> AppResult<Vec<T>> {
        let resp = self
            .authed(self.http.get(self.rest_url(table)))
            .query(&[("select", "*"), ("order", "id.asc")])
            .send()
            .await?;
        let resp = Self::check(resp, "select").await?;
        Ok(resp.json().await?)
    }

    async fn insert_one<B, T>(&self, table: &str, row: &B) -> AppResult<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let resp = self
            .authed(self.http.post(self.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let resp = Self::check(resp, "insert").await?;
        let mut rows: Vec<T> = resp.json().await?;
        rows.pop()
            .ok_or_else(|| AppError::Persist(format!("insert into {table} returned no row")))
    }

    async fn delete_where(&self, table: &str, column: &str, value: &str) -> AppResult<usize> {
        let resp = self
            .authed(self.http.delete(self.rest_url(table)))
            .query(&[(column, format!("eq.{value}"))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let resp = Self::check(resp, "delete").await?;
        let removed: Vec<serde_json::Value> = resp.json().await?;
        Ok(removed.len())
    }
}

impl CatalogStore for SupabaseStore {
    async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.select_all(&self.cfg.products_table).await
    }

    async fn list_access_codes(&self) -> AppResult<Vec<AccessCode>> {
        self.select_all(&self.cfg.access_codes_table).await
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        self.insert_one(&self.cfg.products_table, &product).await
    }

    async fn delete_product(&self, id: i64) -> AppResult<()> {
        self.delete_where(&self.cfg.products_table, "id", &id.to_string())
            .await?;
        Ok(())
    }

    async fn insert_access_code(&self, code: &str) -> AppResult<AccessCode> {
        let row = serde_json::json!({ "code": code });
        self.insert_one(&self.cfg.access_codes_table, &row).await
    }

    async fn delete_access_code(&self, id: i64) -> AppResult<()> {
        self.delete_where(&self.cfg.access_codes_table, "id", &id.to_string())
            .await?;
        Ok(())
    }

    async fn consume_access_code(&self, code: &str) -> AppResult<bool> {
        // One DELETE with a filter; the representation lists what was actually removed.
        let removed = self
            .delete_where(&self.cfg.access_codes_table, "code", code)
            .await?;
        Ok(removed == 1)
    }

    async fn put_image(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let resp = self
            .authed(self.http.post(self.object_url(name)))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        Self::check(resp, "image upload").await?;
        Ok(self.public_object_url(name))
    }
}
