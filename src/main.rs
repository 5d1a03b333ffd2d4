use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use raffle_backend::{
    AppResult,
    config::{Config, StoreBackendKind},
    database::{DatabaseStore, create_pool, run_migrations},
    external::{DownloadDirSaver, SupabaseStore},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    store::{CatalogBackend, LocalBlobDir, MemoryStore},
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

async fn build_backend(config: &Config) -> AppResult<CatalogBackend> {
    let backend = match config.store.backend {
        StoreBackendKind::Supabase => {
            CatalogBackend::Supabase(SupabaseStore::new(config.supabase.clone())?)
        }
        StoreBackendKind::Postgres => {
            let pool = create_pool(&config.database).await?;
            run_migrations(&pool).await?;
            let blobs = LocalBlobDir::new(&config.uploads.dir, &config.uploads.public_base_url);
            CatalogBackend::Postgres(DatabaseStore::new(pool, blobs))
        }
        StoreBackendKind::Memory => {
            log::warn!("Using the in-memory catalog, nothing survives a restart");
            CatalogBackend::Memory(MemoryStore::new(config.uploads.public_base_url.clone()))
        }
    };
    log::info!("Catalog backend: {}", backend.name());
    Ok(backend)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().map_err(|e| {
        log::error!("Failed to load configuration: {e}");
        std::io::Error::other(e.to_string())
    })?;

    let backend = build_backend(&config).await.map_err(|e| {
        log::error!("Failed to initialize catalog backend: {e}");
        std::io::Error::other(e.to_string())
    })?;
    let store = Arc::new(backend);

    let saver = DownloadDirSaver::new(&config.draw.download_dir)
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let jwt_service = JwtService::new(&config.admin.jwt_secret, config.admin.token_expires_in);
    let admin_auth_service =
        AdminAuthService::new(config.admin.password_hash.clone(), jwt_service.clone());
    let catalog: Catalog = CatalogService::new(Arc::clone(&store));
    let sessions: Arc<VisitorSessions> = Arc::new(SessionRegistry::new(
        store,
        Arc::new(saver),
        DrawSettings::from(&config.draw),
    ));

    tasks::spawn_all(
        Arc::clone(&sessions),
        std::time::Duration::from_secs(config.draw.sweep_interval_secs),
        config.draw.session_idle_ttl(),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let sessions = web::Data::from(sessions);
    let uploads = config.uploads.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(admin_auth_service.clone()))
            .app_data(web::Data::new(catalog.clone()))
            .app_data(sessions.clone())
            .app_data(handlers::admin::upload_payload_config(&uploads))
            .configure(swagger_config)
            .configure(handlers::uploads_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::draw_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
