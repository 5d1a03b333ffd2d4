use crate::error::{AppError, AppResult};
use reqwest::Client;
use std::future::Future;
use std::path::PathBuf;

/// Fetches an image and keeps a local copy under the given file name.
pub trait ImageSaver: Send + Sync + 'static {
    fn save(&self, url: &str, file_name: &str) -> impl Future<Output = AppResult<PathBuf>> + Send;
}

/// Saves winner images into a downloads directory.
#[derive(Clone)]
pub struct DownloadDirSaver {
    http: Client,
    dir: PathBuf,
}

impl DownloadDirSaver {
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("raffle-backend/downloader")
            .build()
            .map_err(|e| AppError::ConfigError(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            dir: dir.into(),
        })
    }
}

impl ImageSaver for DownloadDirSaver {
    async fn save(&self, url: &str, file_name: &str) -> AppResult<PathBuf> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &bytes).await?;
        log::info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}
