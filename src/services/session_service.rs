use crate::error::{AppError, AppResult};
use crate::external::ImageSaver;
use crate::services::draw_service::{DrawSession, DrawSettings};
use crate::store::CatalogStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

struct Entry<S, F> {
    session: Arc<DrawSession<S, F>>,
    last_seen: Instant,
}

/// Visitor sessions keyed by id. Each session owns its own product snapshot.
pub struct SessionRegistry<S, F> {
    store: Arc<S>,
    saver: Arc<F>,
    settings: DrawSettings,
    sessions: RwLock<HashMap<Uuid, Entry<S, F>>>,
}

impl<S: CatalogStore, F: ImageSaver> SessionRegistry<S, F> {
    pub fn new(store: Arc<S>, saver: Arc<F>, settings: DrawSettings) -> Self {
        Self {
            store,
            saver,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a session; the product list is fetched now and kept for its lifetime.
    pub async fn create(&self) -> AppResult<(Uuid, Arc<DrawSession<S, F>>)> {
        let session = DrawSession::start(
            Arc::clone(&self.store),
            Arc::clone(&self.saver),
            self.settings.clone(),
        )
        .await?;
        let session = Arc::new(session);
        let id = Uuid::new_v4();

        self.sessions.write().await.insert(
            id,
            Entry {
                session: Arc::clone(&session),
                last_seen: Instant::now(),
            },
        );
        log::info!("Opened draw session {id}");
        Ok((id, session))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Arc<DrawSession<S, F>>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("draw session {id}")))?;
        entry.last_seen = Instant::now();
        Ok(Arc::clone(&entry.session))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops sessions untouched for longer than `ttl`, unless a draw is running.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let candidates: Vec<(Uuid, Arc<DrawSession<S, F>>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, entry)| entry.last_seen.elapsed() > ttl)
                .map(|(id, entry)| (*id, Arc::clone(&entry.session)))
                .collect()
        };

        let mut expired = Vec::new();
        for (id, session) in candidates {
            if !session.is_busy().await {
                expired.push(id);
            }
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for id in expired {
            // touched again since the scan
            let still_stale = sessions
                .get(&id)
                .is_some_and(|entry| entry.last_seen.elapsed() > ttl);
            if still_stale {
                sessions.remove(&id);
                removed += 1;
            }
        }
        removed
    }
}
