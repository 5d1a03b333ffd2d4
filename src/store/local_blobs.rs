use crate::error::{AppError, AppResult};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;

fn object_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9]{1,10}$").expect("valid regex"))
}

/// Object names are generated by `CatalogService`; anything else (path
/// separators, `..`) is refused.
pub fn is_valid_object_name(name: &str) -> bool {
    object_name_regex().is_match(name)
}

/// Image blobs kept on local disk and served by `GET /uploads/{name}`.
#[derive(Debug, Clone)]
pub struct LocalBlobDir {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalBlobDir {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Writes a new blob. An existing object is never replaced.
    pub async fn put(&self, name: &str, bytes: &[u8]) -> AppResult<String> {
        if !is_valid_object_name(name) {
            return Err(AppError::ValidationError(format!(
                "invalid object name: {name}"
            )));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.dir.join(name))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(AppError::Upload(format!("object {name} already exists")));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(format!("{}/{}", self.public_base_url, name))
    }

    pub async fn read(&self, name: &str) -> AppResult<Option<Vec<u8>>> {
        if !is_valid_object_name(name) {
            return Ok(None);
        }
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
