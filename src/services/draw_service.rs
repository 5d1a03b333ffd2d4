//! The draw engine: one visitor session's code validation, reveal animation
//! and settlement.
//!
//! State machine: `Idle -> Validating -> Revealing -> Settled`, back to
//! `Idle` through [`DrawSession::reset`]. Only a `true` result from
//! `consume_access_code` moves a session past `Validating`; every error
//! before that point returns the session to `Idle`. A consumed code is never
//! restored, whatever happens afterwards.

use crate::config::DrawConfig;
use crate::error::{AppError, AppResult};
use crate::external::ImageSaver;
use crate::models::{DrawResult, DrawSessionSnapshot, DrawStateKind, Product, RevealFrame};
use crate::store::CatalogStore;
use crate::utils::download_file_name;
use chrono::Utc;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

const FRAME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct DrawSettings {
    pub tick_count: u32,
    pub tick_interval: Duration,
    pub download_delay: Duration,
    pub download_suffix: String,
    /// Force the last displayed frame to be the awarded product.
    pub final_frame_matches_winner: bool,
}

impl Default for DrawSettings {
    fn default() -> Self {
        (&DrawConfig::default()).into()
    }
}

impl From<&DrawConfig> for DrawSettings {
    fn from(cfg: &DrawConfig) -> Self {
        Self {
            tick_count: cfg.tick_count,
            tick_interval: cfg.tick_interval(),
            download_delay: cfg.download_delay(),
            download_suffix: cfg.download_suffix.clone(),
            final_frame_matches_winner: cfg.final_frame_matches_winner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawState {
    Idle,
    Validating,
    Revealing { frame: Option<RevealFrame> },
    Settled(DrawResult),
}

impl DrawState {
    pub fn kind(&self) -> DrawStateKind {
        match self {
            DrawState::Idle => DrawStateKind::Idle,
            DrawState::Validating => DrawStateKind::Validating,
            DrawState::Revealing { .. } => DrawStateKind::Revealing,
            DrawState::Settled(_) => DrawStateKind::Settled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Settled(DrawResult),
    /// The session was not idle; nothing happened.
    Ignored,
}

struct Shared {
    state: DrawState,
    products: Arc<Vec<Product>>,
}

pub struct DrawSession<S, F> {
    store: Arc<S>,
    saver: Arc<F>,
    settings: DrawSettings,
    shared: Mutex<Shared>,
    frames: broadcast::Sender<RevealFrame>,
}

/// Uniform pick over the whole list.
pub fn pick_uniform<'a, R: rand::Rng + ?Sized>(
    products: &'a [Product],
    rng: &mut R,
) -> Option<&'a Product> {
    products.choose(rng)
}

impl<S: CatalogStore, F: ImageSaver> DrawSession<S, F> {
    /// Opens a session with a fresh product snapshot.
    pub async fn start(store: Arc<S>, saver: Arc<F>, settings: DrawSettings) -> AppResult<Self> {
        let products = store.list_products().await?;
        Ok(Self::with_products(store, saver, settings, products))
    }

    pub fn with_products(
        store: Arc<S>,
        saver: Arc<F>,
        settings: DrawSettings,
        products: Vec<Product>,
    ) -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            store,
            saver,
            settings,
            shared: Mutex::new(Shared {
                state: DrawState::Idle,
                products: Arc::new(products),
            }),
            frames,
        }
    }

    /// Receives every reveal frame emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RevealFrame> {
        self.frames.subscribe()
    }

    pub async fn state(&self) -> DrawState {
        self.shared.lock().await.state.clone()
    }

    pub async fn products(&self) -> Arc<Vec<Product>> {
        Arc::clone(&self.shared.lock().await.products)
    }

    pub async fn is_busy(&self) -> bool {
        matches!(
            self.shared.lock().await.state,
            DrawState::Validating | DrawState::Revealing { .. }
        )
    }

    pub async fn snapshot(&self, session_id: Uuid) -> DrawSessionSnapshot {
        let shared = self.shared.lock().await;
        let (frame, result) = match &shared.state {
            DrawState::Revealing { frame } => (frame.clone(), None),
            DrawState::Settled(result) => (None, Some(result.clone())),
            _ => (None, None),
        };
        DrawSessionSnapshot {
            session_id,
            state: shared.state.kind(),
            product_count: shared.products.len(),
            frame,
            result,
        }
    }

    /// Runs one attempt with `code`.
    ///
    /// Once the session leaves `Idle` the attempt runs on its own task, so a
    /// dropped caller cannot strand the session mid-draw.
    pub async fn submit(self: &Arc<Self>, code: &str) -> AppResult<SubmitOutcome> {
        let code = code.trim().to_string();
        let products = {
            let mut shared = self.shared.lock().await;
            if shared.state != DrawState::Idle {
                log::debug!("Submit ignored, session is {:?}", shared.state.kind());
                return Ok(SubmitOutcome::Ignored);
            }
            if code.is_empty() {
                return Err(AppError::EmptyInput);
            }
            if shared.products.is_empty() {
                return Err(AppError::NoProducts);
            }
            shared.state = DrawState::Validating;
            Arc::clone(&shared.products)
        };

        let session = Arc::clone(self);
        tokio::spawn(async move { session.run_attempt(&code, products).await })
            .await
            .map_err(|e| AppError::InternalError(format!("draw task failed: {e}")))?
    }

    /// Back to `Idle` from `Settled`. The consumed code stays consumed.
    pub async fn reset(&self) -> bool {
        let mut shared = self.shared.lock().await;
        if matches!(shared.state, DrawState::Settled(_)) {
            shared.state = DrawState::Idle;
            true
        } else {
            false
        }
    }

    /// Replaces the product snapshot. Only applied while `Idle`.
    pub async fn refresh_products(&self) -> AppResult<bool> {
        let products = self.store.list_products().await?;
        let mut shared = self.shared.lock().await;
        if shared.state != DrawState::Idle {
            return Ok(false);
        }
        shared.products = Arc::new(products);
        Ok(true)
    }

    async fn run_attempt(
        &self,
        code: &str,
        products: Arc<Vec<Product>>,
    ) -> AppResult<SubmitOutcome> {
        match self.store.consume_access_code(code).await {
            Ok(true) => {
                log::info!(
                    "Access code accepted, revealing among {} products",
                    products.len()
                );
            }
            Ok(false) => {
                self.set_state(DrawState::Idle).await;
                log::warn!("Rejected invalid or used access code");
                return Err(AppError::InvalidOrUsedCode);
            }
            Err(e) => {
                self.set_state(DrawState::Idle).await;
                return Err(e);
            }
        }

        self.set_state(DrawState::Revealing { frame: None }).await;
        let result = self.reveal(&products).await?;

        log::info!(
            "Draw settled: product {} ({})",
            result.winner.id,
            result.winner.title
        );
        self.set_state(DrawState::Settled(result.clone())).await;
        self.schedule_image_save(&result.winner);

        Ok(SubmitOutcome::Settled(result))
    }

    /// Evenly spaced ticks, each showing a uniform pick, then an
    /// independent uniform pick for the winner.
    async fn reveal(&self, products: &[Product]) -> AppResult<DrawResult> {
        let period = self.settings.tick_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut last_shown: Option<Product> = None;
        for tick in 1..=self.settings.tick_count {
            ticker.tick().await;
            let product = pick_uniform(products, &mut rand::thread_rng())
                .cloned()
                .ok_or(AppError::NoProducts)?;
            let frame = RevealFrame { tick, product };

            log::debug!("Reveal tick {tick}: product {}", frame.product.id);
            self.set_state(DrawState::Revealing {
                frame: Some(frame.clone()),
            })
            .await;
            // no subscribers is fine
            let _ = self.frames.send(frame.clone());
            last_shown = Some(frame.product);
        }

        let winner = match last_shown {
            Some(shown) if self.settings.final_frame_matches_winner => shown,
            _ => pick_uniform(products, &mut rand::thread_rng())
                .cloned()
                .ok_or(AppError::NoProducts)?,
        };

        Ok(DrawResult {
            winner,
            drawn_at: Utc::now(),
        })
    }

    fn schedule_image_save(&self, winner: &Product) {
        if winner.image_url.is_empty() {
            log::debug!("Winner {} has no image, nothing to save", winner.id);
            return;
        }

        let saver = Arc::clone(&self.saver);
        let delay = self.settings.download_delay;
        let url = winner.image_url.clone();
        let file_name = download_file_name(&winner.title, &self.settings.download_suffix);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = saver.save(&url, &file_name).await {
                log::warn!("Failed to save winner image {url} as {file_name}: {e}");
            }
        });
    }

    async fn set_state(&self, state: DrawState) {
        self.shared.lock().await.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessCode, NewProduct};
    use crate::store::MemoryStore;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts consumption calls on top of a memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        consumed: AtomicUsize,
    }

    impl CatalogStore for CountingStore {
        async fn list_products(&self) -> AppResult<Vec<Product>> {
            self.inner.list_products().await
        }
        async fn list_access_codes(&self) -> AppResult<Vec<AccessCode>> {
            self.inner.list_access_codes().await
        }
        async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
            self.inner.insert_product(product).await
        }
        async fn delete_product(&self, id: i64) -> AppResult<()> {
            self.inner.delete_product(id).await
        }
        async fn insert_access_code(&self, code: &str) -> AppResult<AccessCode> {
            self.inner.insert_access_code(code).await
        }
        async fn delete_access_code(&self, id: i64) -> AppResult<()> {
            self.inner.delete_access_code(id).await
        }
        async fn consume_access_code(&self, code: &str) -> AppResult<bool> {
            self.consumed.fetch_add(1, Ordering::SeqCst);
            self.inner.consume_access_code(code).await
        }
        async fn put_image(&self, name: &str, bytes: Vec<u8>, ct: &str) -> AppResult<String> {
            self.inner.put_image(name, bytes, ct).await
        }
    }

    #[derive(Default)]
    struct RecordingSaver {
        saved: std::sync::Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl ImageSaver for RecordingSaver {
        async fn save(&self, url: &str, file_name: &str) -> AppResult<PathBuf> {
            if self.fail {
                return Err(AppError::Transport("download failed".into()));
            }
            self.saved
                .lock()
                .unwrap()
                .push((url.to_string(), file_name.to_string()));
            Ok(PathBuf::from(file_name))
        }
    }

    fn fast_settings() -> DrawSettings {
        DrawSettings {
            tick_count: 3,
            tick_interval: Duration::from_millis(10),
            download_delay: Duration::from_millis(2000),
            download_suffix: "_winner.png".into(),
            final_frame_matches_winner: false,
        }
    }

    async fn seeded_store(titles: &[&str], codes: &[&str]) -> Arc<CountingStore> {
        let store = CountingStore::default();
        for title in titles {
            store
                .insert_product(NewProduct {
                    title: title.to_string(),
                    image_url: format!("https://cdn.example/{title}.png"),
                })
                .await
                .unwrap();
        }
        for code in codes {
            store.insert_access_code(code).await.unwrap();
        }
        Arc::new(store)
    }

    async fn session(
        store: &Arc<CountingStore>,
        settings: DrawSettings,
    ) -> (Arc<DrawSession<CountingStore, RecordingSaver>>, Arc<RecordingSaver>) {
        let saver = Arc::new(RecordingSaver::default());
        let session = DrawSession::start(Arc::clone(store), Arc::clone(&saver), settings)
            .await
            .unwrap();
        (Arc::new(session), saver)
    }

    fn settled(outcome: SubmitOutcome) -> DrawResult {
        match outcome {
            SubmitOutcome::Settled(result) => result,
            SubmitOutcome::Ignored => panic!("submit was ignored"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_code_is_single_use() {
        let store = seeded_store(&["Gift A", "Gift B"], &["ABC123"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        let result = settled(session.submit("ABC123").await.unwrap());
        assert!(["Gift A", "Gift B"].contains(&result.winner.title.as_str()));
        assert!(matches!(session.state().await, DrawState::Settled(_)));

        assert!(session.reset().await);
        let err = session.submit("ABC123").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrUsedCode));
        assert_eq!(session.state().await, DrawState::Idle);

        // a different session sees the same
        let (other, _) = self::session(&store, fast_settings()).await;
        assert!(matches!(
            other.submit("ABC123").await,
            Err(AppError::InvalidOrUsedCode)
        ));
    }

    #[tokio::test]
    async fn test_empty_code_never_consumes() {
        let store = seeded_store(&["Gift A"], &["ABC123"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        for input in ["", "   ", "\t\n"] {
            let err = session.submit(input).await.unwrap_err();
            assert!(matches!(err, AppError::EmptyInput));
            assert_eq!(session.state().await, DrawState::Idle);
        }
        assert_eq!(store.consumed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_catalog_never_consumes() {
        let store = seeded_store(&[], &["ABC123"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        let err = session.submit("ABC123").await.unwrap_err();
        assert!(matches!(err, AppError::NoProducts));
        assert_eq!(session.state().await, DrawState::Idle);
        assert_eq!(store.consumed.load(Ordering::SeqCst), 0);
        assert_eq!(store.list_access_codes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_code_returns_to_idle() {
        let store = seeded_store(&["Gift A"], &["ABC123"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        let err = session.submit("NOPE").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrUsedCode));
        assert_eq!(session.state().await, DrawState::Idle);
        assert_eq!(store.list_access_codes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_returns_to_idle() {
        let store = seeded_store(&["Gift A"], &["ABC123"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        store.inner.set_offline(true);
        let err = session.submit("ABC123").await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
        assert_eq!(session.state().await, DrawState::Idle);

        store.inner.set_offline(false);
        assert!(session.submit("ABC123").await.is_ok());
    }

    #[tokio::test]
    async fn test_start_surfaces_fetch_failure() {
        let store = seeded_store(&["Gift A"], &[]).await;
        store.inner.set_offline(true);
        let result = DrawSession::start(
            Arc::clone(&store),
            Arc::new(RecordingSaver::default()),
            fast_settings(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }

    #[tokio::test]
    async fn test_reveal_timing_and_frame_count() {
        let store = seeded_store(&["Gift A", "Gift B", "Gift C"], &["ABC123"]).await;
        let settings = DrawSettings {
            tick_count: 30,
            tick_interval: Duration::from_millis(100),
            ..fast_settings()
        };
        let (session, _) = session(&store, settings).await;
        let products = session.products().await;
        let mut frames = session.subscribe();

        let started = std::time::Instant::now();
        settled(session.submit("ABC123").await.unwrap());
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(2900), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3500), "{elapsed:?}");

        let mut received = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            received.push(frame);
        }
        assert_eq!(received.len(), 30);
        for (i, frame) in received.iter().enumerate() {
            assert_eq!(frame.tick as usize, i + 1);
            assert!(products.contains(&frame.product));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_uniform() {
        let store = seeded_store(&["Gift A", "Gift B", "Gift C"], &["ABC123"]).await;
        let settings = DrawSettings {
            tick_count: 10_000,
            tick_interval: Duration::from_millis(1),
            ..fast_settings()
        };
        let (session, _) = session(&store, settings).await;
        let mut frames = session.subscribe();

        let collector = tokio::spawn(async move {
            let mut counts = std::collections::HashMap::new();
            while let Ok(frame) = frames.recv().await {
                *counts.entry(frame.product.id).or_insert(0u32) += 1;
                if frame.tick == 10_000 {
                    break;
                }
            }
            counts
        });

        settled(session.submit("ABC123").await.unwrap());
        let counts = collector.await.unwrap();

        assert_eq!(counts.values().sum::<u32>(), 10_000);
        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            let share = f64::from(*count) / 10_000.0;
            assert!((0.30..0.367).contains(&share), "share {share}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_independent_of_last_frame() {
        const TRIALS: usize = 600;
        let codes: Vec<String> = (0..TRIALS).map(|i| format!("CODE{i}")).collect();
        let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        let store = seeded_store(&["A", "B", "C", "D"], &code_refs).await;
        let settings = DrawSettings {
            tick_count: 2,
            tick_interval: Duration::from_millis(1),
            ..fast_settings()
        };
        let (session, _) = session(&store, settings).await;
        let mut frames = session.subscribe();

        let mut matches = 0u32;
        for code in &codes {
            let result = settled(session.submit(code).await.unwrap());
            let mut last = None;
            while let Ok(frame) = frames.try_recv() {
                last = Some(frame);
            }
            if last.unwrap().product == result.winner {
                matches += 1;
            }
            assert!(session.reset().await);
        }

        let rate = f64::from(matches) / TRIALS as f64;
        assert!((0.12..0.40).contains(&rate), "match rate {rate}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_frame_matches_winner_when_configured() {
        let store = seeded_store(&["A", "B", "C", "D"], &["X1", "X2", "X3", "X4", "X5"]).await;
        let settings = DrawSettings {
            final_frame_matches_winner: true,
            ..fast_settings()
        };
        let (session, _) = session(&store, settings).await;
        let mut frames = session.subscribe();

        for code in ["X1", "X2", "X3", "X4", "X5"] {
            let result = settled(session.submit(code).await.unwrap());
            let mut last = None;
            while let Ok(frame) = frames.try_recv() {
                last = Some(frame);
            }
            assert_eq!(last.unwrap().product, result.winner);
            session.reset().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_allows_fresh_code() {
        let store = seeded_store(&["Gift A", "Gift B"], &["FIRST", "SECOND"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        assert!(!session.reset().await, "reset from idle is a no-op");
        settled(session.submit("FIRST").await.unwrap());

        // settled sessions ignore new codes until reset
        assert_eq!(
            session.submit("SECOND").await.unwrap(),
            SubmitOutcome::Ignored
        );
        assert_eq!(store.list_access_codes().await.unwrap().len(), 1);

        assert!(session.reset().await);
        let snapshot = session.snapshot(Uuid::nil()).await;
        assert_eq!(snapshot.state, DrawStateKind::Idle);
        assert!(snapshot.result.is_none());

        settled(session.submit("SECOND").await.unwrap());
        assert!(store.list_access_codes().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submits_in_one_session() {
        let store = seeded_store(&["Gift A"], &["ONE", "TWO"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        let (a, b) = tokio::join!(session.submit("ONE"), session.submit("TWO"));
        let outcomes = [a.unwrap(), b.unwrap()];
        let ignored = outcomes
            .iter()
            .filter(|o| **o == SubmitOutcome::Ignored)
            .count();
        assert_eq!(ignored, 1);
        assert_eq!(store.consumed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sessions_share_one_code() {
        let store = seeded_store(&["Gift A", "Gift B"], &["SHARED"]).await;
        let mut sessions = Vec::new();
        for _ in 0..16 {
            sessions.push(session(&store, fast_settings()).await.0);
        }

        let attempts = sessions
            .iter()
            .map(|s| {
                let s = Arc::clone(s);
                tokio::spawn(async move { s.submit("SHARED").await })
            })
            .collect::<Vec<_>>();
        let results = futures_util::future::join_all(attempts).await;

        let mut winners = 0;
        let mut rejected = 0;
        for result in results {
            match result.unwrap() {
                Ok(SubmitOutcome::Settled(_)) => winners += 1,
                Err(AppError::InvalidOrUsedCode) => rejected += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(rejected, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_image_saved_after_delay() {
        let store = seeded_store(&["Gift A"], &["ABC123"]).await;
        let (session, saver) = session(&store, fast_settings()).await;

        settled(session.submit("ABC123").await.unwrap());
        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(saver.saved.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let saved = saver.saved.lock().unwrap().clone();
        assert_eq!(
            saved,
            vec![(
                "https://cdn.example/Gift A.png".to_string(),
                "Gift A_winner.png".to_string()
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_image_save_keeps_settled_state() {
        let store = seeded_store(&["Gift A"], &["ABC123"]).await;
        let saver = Arc::new(RecordingSaver {
            fail: true,
            ..RecordingSaver::default()
        });
        let session = Arc::new(
            DrawSession::start(Arc::clone(&store), saver, fast_settings())
                .await
                .unwrap(),
        );

        let result = settled(session.submit("ABC123").await.unwrap());
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(session.state().await, DrawState::Settled(result));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_fixed_during_attempt() {
        let store = seeded_store(&["Gift A"], &["ABC123"]).await;
        let (session, _) = session(&store, fast_settings()).await;

        store
            .insert_product(NewProduct {
                title: "Late".into(),
                image_url: String::new(),
            })
            .await
            .unwrap();

        let result = settled(session.submit("ABC123").await.unwrap());
        assert_eq!(result.winner.title, "Gift A");
        assert!(!session.refresh_products().await.unwrap());

        session.reset().await;
        assert!(session.refresh_products().await.unwrap());
        assert_eq!(session.products().await.len(), 2);
    }
}
