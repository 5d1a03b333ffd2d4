use crate::models::*;
use crate::services::{SubmitOutcome, VisitorSessions};
use actix_web::{HttpResponse, ResponseError, Result, web};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/draw/sessions",
    tag = "draw",
    responses(
        (status = 200, description = "Session opened with a fresh product snapshot", body = DrawSessionSnapshot),
        (status = 502, description = "Catalog backend unreachable")
    )
)]
pub async fn create_session(sessions: web::Data<VisitorSessions>) -> Result<HttpResponse> {
    match sessions.create().await {
        Ok((id, session)) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            session.snapshot(id).await,
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/draw/sessions/{id}",
    tag = "draw",
    params(
        ("id" = Uuid, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Current state, reveal frame and result", body = DrawSessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    sessions: web::Data<VisitorSessions>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    match sessions.get(id).await {
        Ok(session) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            session.snapshot(id).await,
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/sessions/{id}/submit",
    tag = "draw",
    params(
        ("id" = Uuid, Path, description = "Session id")
    ),
    request_body = SubmitCodeRequest,
    responses(
        (status = 200, description = "Draw settled, or ignored because one is already running", body = SubmitCodeResponse),
        (status = 400, description = "Empty, invalid or already used access code"),
        (status = 409, description = "No products registered"),
        (status = 502, description = "Catalog backend unreachable")
    )
)]
pub async fn submit_code(
    sessions: web::Data<VisitorSessions>,
    path: web::Path<Uuid>,
    request: web::Json<SubmitCodeRequest>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let session = match sessions.get(id).await {
        Ok(session) => session,
        Err(e) => return Ok(e.error_response()),
    };

    match session.submit(&request.code).await {
        Ok(outcome) => {
            let accepted = matches!(outcome, SubmitOutcome::Settled(_));
            Ok(HttpResponse::Ok().json(ApiResponse::success(SubmitCodeResponse {
                accepted,
                session: session.snapshot(id).await,
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/sessions/{id}/reset",
    tag = "draw",
    params(
        ("id" = Uuid, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Session back to idle with refreshed products", body = DrawSessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn reset_session(
    sessions: web::Data<VisitorSessions>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let session = match sessions.get(id).await {
        Ok(session) => session,
        Err(e) => return Ok(e.error_response()),
    };

    session.reset().await;
    // a stale snapshot is still usable
    if let Err(e) = session.refresh_products().await {
        log::warn!("Could not refresh products for session {id}: {e}");
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(session.snapshot(id).await)))
}

pub fn draw_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/draw/sessions")
            .route("", web::post().to(create_session))
            .route("/{id}", web::get().to(get_session))
            .route("/{id}/submit", web::post().to(submit_code))
            .route("/{id}/reset", web::post().to(reset_session)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::DownloadDirSaver;
    use crate::models::NewProduct;
    use crate::services::{DrawSettings, SessionRegistry};
    use crate::store::{CatalogBackend, CatalogStore, MemoryStore};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    fn sessions(store: MemoryStore) -> web::Data<VisitorSessions> {
        let saver = DownloadDirSaver::new(std::env::temp_dir().join("raffle-draw-handler"))
            .unwrap();
        let settings = DrawSettings {
            tick_count: 3,
            tick_interval: Duration::from_millis(1),
            download_delay: Duration::from_secs(3600),
            ..DrawSettings::default()
        };
        web::Data::new(SessionRegistry::new(
            Arc::new(CatalogBackend::Memory(store)),
            Arc::new(saver),
            settings,
        ))
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::default();
        store
            .insert_product(NewProduct {
                title: "Gift A".into(),
                image_url: String::new(),
            })
            .await
            .unwrap();
        store.insert_access_code("LUCKY1").await.unwrap();
        store
    }

    #[actix_web::test]
    async fn test_session_lifecycle() {
        let app = test::init_service(
            App::new()
                .app_data(sessions(seeded_store().await))
                .configure(draw_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/draw/sessions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["state"], "idle");
        assert_eq!(body["data"]["product_count"], 1);
        let id = body["data"]["session_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/draw/sessions/{id}/submit"))
            .set_json(serde_json::json!({ "code": "LUCKY1" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["accepted"], true);
        assert_eq!(body["data"]["session"]["state"], "settled");
        assert_eq!(body["data"]["session"]["result"]["winner"]["title"], "Gift A");

        let req = test::TestRequest::post()
            .uri(&format!("/draw/sessions/{id}/reset"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["state"], "idle");

        // the code was consumed by the first attempt
        let req = test::TestRequest::post()
            .uri(&format!("/draw/sessions/{id}/submit"))
            .set_json(serde_json::json!({ "code": "LUCKY1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_OR_USED_CODE");
    }

    #[actix_web::test]
    async fn test_empty_code_and_unknown_session() {
        let app = test::init_service(
            App::new()
                .app_data(sessions(seeded_store().await))
                .configure(draw_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/draw/sessions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["session_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/draw/sessions/{id}/submit"))
            .set_json(serde_json::json!({ "code": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri(&format!("/draw/sessions/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_create_session_with_backend_down() {
        let store = MemoryStore::default();
        store.set_offline(true);
        let app = test::init_service(
            App::new()
                .app_data(sessions(store))
                .configure(draw_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/draw/sessions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
