use crate::error::AppError;
use crate::utils::{Claims, JwtService};
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// Everything under `prefix_paths` needs an admin token, except `excluded_paths`.
struct ProtectedPaths {
    prefix_paths: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
}

impl ProtectedPaths {
    fn new() -> Self {
        Self {
            prefix_paths: vec!["/api/v1/admin/"],
            excluded_paths: vec!["/api/v1/admin/login"],
        }
    }

    fn requires_token(&self, path: &str) -> bool {
        if self.excluded_paths.contains(&path) {
            return false;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            protected_paths: ProtectedPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    protected_paths: ProtectedPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        if !self.protected_paths.requires_token(req.path()) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        match self.jwt_service.verify_admin_token(&token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                Box::pin(self.service.call(req))
            }
            Err(_) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// Claims of the admin token that passed the guard.
pub fn get_admin_claims(req: &actix_web::HttpRequest) -> Option<Claims> {
    req.extensions().get::<Claims>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test as actix_test, web};

    async fn whoami(req: actix_web::HttpRequest) -> HttpResponse {
        match get_admin_claims(&req) {
            Some(claims) => HttpResponse::Ok().body(claims.role),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    #[test]
    fn test_protected_paths() {
        let paths = ProtectedPaths::new();
        assert!(paths.requires_token("/api/v1/admin/products"));
        assert!(paths.requires_token("/api/v1/admin/access-codes/3"));
        assert!(!paths.requires_token("/api/v1/admin/login"));
        assert!(!paths.requires_token("/api/v1/draw/sessions"));
        assert!(!paths.requires_token("/uploads/1.png"));
    }

    #[actix_web::test]
    async fn test_admin_routes_require_token() {
        let jwt = JwtService::new("secret", 60);
        let token = jwt.generate_admin_token().unwrap();
        let app = actix_test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt))
                .route("/api/v1/admin/products", web::get().to(whoami))
                .route("/api/v1/draw/sessions", web::post().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/products")
            .to_request();
        let err = actix_test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/products")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        assert!(actix_test::try_call_service(&app, req).await.is_err());

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/products")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), b"admin");

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/draw/sessions")
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), b"anonymous");
    }
}
