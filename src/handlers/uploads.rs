use crate::services::Catalog;
use crate::store::local_blobs::is_valid_object_name;
use crate::utils::{content_type_for, file_extension};
use actix_web::{HttpResponse, ResponseError, Result, web};

/// Serves product images for backends that keep blobs locally.
pub async fn get_upload(
    catalog: web::Data<Catalog>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    if !is_valid_object_name(&name) {
        return Ok(HttpResponse::NotFound().finish());
    }

    match catalog.store().local_image(&name).await {
        Ok(Some(bytes)) => Ok(HttpResponse::Ok()
            .content_type(content_type_for(&file_extension(&name)))
            .insert_header(("Cache-Control", "public, max-age=86400"))
            .body(bytes)),
        Ok(None) => Ok(HttpResponse::NotFound().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn uploads_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/uploads/{name}", web::get().to(get_upload));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CatalogService;
    use crate::store::{CatalogBackend, CatalogStore, MemoryStore};
    use actix_web::{App, http::StatusCode, test};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_serves_stored_image() {
        let store = MemoryStore::default();
        store
            .put_image("1700000000000.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        let catalog = CatalogService::new(Arc::new(CatalogBackend::Memory(store)));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(catalog))
                .configure(uploads_config),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/uploads/1700000000000.png")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "image/png"
        );
        assert_eq!(test::read_body(resp).await.as_ref(), &[1, 2, 3]);

        let req = test::TestRequest::get().uri("/uploads/missing.png").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/uploads/..%2Fsecret").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
