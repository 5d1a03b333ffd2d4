use crate::config::UploadsConfig;
use crate::middlewares::get_admin_claims;
use crate::models::*;
use crate::services::{AdminAuthService, Catalog};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

/// Body limit for raw image uploads; actix defaults to 256 KiB otherwise.
pub fn upload_payload_config(uploads: &UploadsConfig) -> web::PayloadConfig {
    web::PayloadConfig::new(uploads.max_image_bytes)
}

fn admin_subject(req: &HttpRequest) -> String {
    get_admin_claims(req)
        .map(|claims| claims.sub)
        .unwrap_or_else(|| "unknown".to_string())
}

#[utoipa::path(
    post,
    path = "/admin/login",
    tag = "admin",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin token issued", body = AdminLoginResponse),
        (status = 401, description = "Wrong password")
    )
)]
pub async fn login(
    auth_service: web::Data<AdminAuthService>,
    request: web::Json<AdminLoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(&request.password).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All registered products", body = [Product]),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Catalog backend unreachable")
    )
)]
pub async fn list_products(catalog: web::Data<Catalog>) -> Result<HttpResponse> {
    match catalog.list_products().await {
        Ok(products) => Ok(HttpResponse::Ok().json(ApiResponse::success(products))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "admin",
    params(
        ("title" = String, Query, description = "Product title"),
        ("file_name" = String, Query, description = "Original image file name, used for the extension")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream", description = "Raw image bytes"),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Image uploaded and product registered", body = Product),
        (status = 400, description = "Missing title or image"),
        (status = 413, description = "Image larger than uploads.max_image_bytes"),
        (status = 502, description = "Upload or insert failed")
    )
)]
pub async fn create_product(
    catalog: web::Data<Catalog>,
    req: HttpRequest,
    query: web::Query<CreateProductQuery>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    log::info!(
        "Admin {} uploading product image {} ({} bytes)",
        admin_subject(&req),
        query.file_name,
        body.len()
    );
    match catalog
        .create_product(&query.title, body.to_vec(), &query.file_name)
        .await
    {
        Ok(product) => Ok(HttpResponse::Ok().json(ApiResponse::with_message(
            product,
            "Product registered",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Product id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 502, description = "Catalog backend unreachable")
    )
)]
pub async fn delete_product(
    catalog: web::Data<Catalog>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    log::info!("Admin {} deleting product {id}", admin_subject(&req));
    match catalog.delete_product(id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::with_message((), "Product deleted"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/access-codes",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All unused access codes", body = [AccessCode]),
        (status = 502, description = "Catalog backend unreachable")
    )
)]
pub async fn list_access_codes(catalog: web::Data<Catalog>) -> Result<HttpResponse> {
    match catalog.list_access_codes().await {
        Ok(codes) => Ok(HttpResponse::Ok().json(ApiResponse::success(codes))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/access-codes",
    tag = "admin",
    request_body = CreateAccessCodeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Access code stored", body = AccessCode),
        (status = 409, description = "Code already exists or could not be stored")
    )
)]
pub async fn create_access_code(
    catalog: web::Data<Catalog>,
    request: web::Json<CreateAccessCodeRequest>,
) -> Result<HttpResponse> {
    match catalog.create_access_code(request.code.as_deref()).await {
        Ok(code) => Ok(HttpResponse::Ok().json(ApiResponse::success(code))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/access-codes/batch",
    tag = "admin",
    request_body = IssueAccessCodesRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Generated codes; collisions are skipped", body = IssuedCodesResponse),
        (status = 400, description = "Count out of range")
    )
)]
pub async fn issue_access_codes(
    catalog: web::Data<Catalog>,
    request: web::Json<IssueAccessCodesRequest>,
) -> Result<HttpResponse> {
    match catalog.issue_access_codes(request.count).await {
        Ok((issued, skipped)) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            IssuedCodesResponse { issued, skipped },
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/access-codes/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Access code id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Access code deleted"),
        (status = 502, description = "Catalog backend unreachable")
    )
)]
pub async fn delete_access_code(
    catalog: web::Data<Catalog>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    log::info!("Admin {} deleting access code {id}", admin_subject(&req));
    match catalog.delete_access_code(id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::with_message(
            (),
            "Access code deleted",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/login", web::post().to(login))
            .route("/products", web::get().to(list_products))
            .route("/products", web::post().to(create_product))
            .route("/products/{id}", web::delete().to(delete_product))
            .route("/access-codes", web::get().to(list_access_codes))
            .route("/access-codes", web::post().to(create_access_code))
            .route("/access-codes/batch", web::post().to(issue_access_codes))
            .route("/access-codes/{id}", web::delete().to(delete_access_code)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CatalogService;
    use crate::store::{CatalogBackend, MemoryStore};
    use crate::utils::{JwtService, hash_password};
    use actix_web::{App, HttpMessage, http::StatusCode, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn catalog(store: &MemoryStore) -> web::Data<Catalog> {
        web::Data::new(CatalogService::new(Arc::new(CatalogBackend::Memory(
            store.clone(),
        ))))
    }

    fn auth() -> web::Data<AdminAuthService> {
        let hash = hash_password("letmein", 4).unwrap();
        web::Data::new(AdminAuthService::new(hash, JwtService::new("secret", 60)))
    }

    #[actix_web::test]
    async fn test_login() {
        let app = test::init_service(
            App::new()
                .app_data(auth())
                .configure(admin_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/login")
            .set_json(json!({ "password": "letmein" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["token_type"], "Bearer");

        let req = test::TestRequest::post()
            .uri("/admin/login")
            .set_json(json!({ "password": "nope" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_product_upload_list_delete() {
        let store = MemoryStore::new("http://localhost:8080/uploads");
        let app = test::init_service(
            App::new()
                .app_data(catalog(&store))
                .configure(admin_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/products?title=Gift%20A&file_name=gift.png")
            .set_payload(vec![0x89, 0x50, 0x4E, 0x47])
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["title"], "Gift A");
        let id = body["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::get().uri("/admin/products").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/admin/products/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/admin/products?title=Empty&file_name=gift.png")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_admin_subject_from_verified_claims() {
        let req = test::TestRequest::default().to_http_request();
        assert_eq!(admin_subject(&req), "unknown");

        let jwt = JwtService::new("secret", 60);
        let claims = jwt
            .verify_admin_token(&jwt.generate_admin_token().unwrap())
            .unwrap();
        req.extensions_mut().insert(claims);
        assert_eq!(admin_subject(&req), "admin");
    }

    #[actix_web::test]
    async fn test_photo_larger_than_default_body_limit() {
        let store = MemoryStore::new("http://localhost:8080/uploads");
        let app = test::init_service(
            App::new()
                .app_data(catalog(&store))
                .app_data(upload_payload_config(&UploadsConfig::default()))
                .configure(admin_config),
        )
        .await;

        let photo = vec![0xAB; 300 * 1024];
        let req = test::TestRequest::post()
            .uri("/admin/products?title=Photo&file_name=photo.jpg")
            .set_payload(photo.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let url = body["data"]["image_url"].as_str().unwrap();
        let name = url.rsplit('/').next().unwrap();
        assert_eq!(store.image(name).await, Some(photo));

        let small = UploadsConfig {
            max_image_bytes: 1024,
            ..UploadsConfig::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(catalog(&store))
                .app_data(upload_payload_config(&small))
                .configure(admin_config),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/admin/products?title=Photo&file_name=photo.jpg")
            .set_payload(vec![0xAB; 2048])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_access_code_routes() {
        let store = MemoryStore::default();
        let app = test::init_service(
            App::new()
                .app_data(catalog(&store))
                .configure(admin_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/access-codes")
            .set_json(json!({ "code": "VIP2026" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["code"], "VIP2026");

        let req = test::TestRequest::post()
            .uri("/admin/access-codes")
            .set_json(json!({ "code": "VIP2026" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/admin/access-codes")
            .set_json(json!({}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["code"].as_str().unwrap().len(), 8);

        let req = test::TestRequest::post()
            .uri("/admin/access-codes/batch")
            .set_json(json!({ "count": 5 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let issued = body["data"]["issued"].as_array().unwrap().len() as u64;
        assert_eq!(issued + body["data"]["skipped"].as_u64().unwrap(), 5);

        let req = test::TestRequest::get().uri("/admin/access-codes").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len() as u64, 2 + issued);
    }
}
