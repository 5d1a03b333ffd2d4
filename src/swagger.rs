use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::draw::create_session,
        handlers::draw::get_session,
        handlers::draw::submit_code,
        handlers::draw::reset_session,
        handlers::admin::login,
        handlers::admin::list_products,
        handlers::admin::create_product,
        handlers::admin::delete_product,
        handlers::admin::list_access_codes,
        handlers::admin::create_access_code,
        handlers::admin::issue_access_codes,
        handlers::admin::delete_access_code,
    ),
    components(
        schemas(
            Product,
            AccessCode,
            CreateAccessCodeRequest,
            IssueAccessCodesRequest,
            IssuedCodesResponse,
            AdminLoginRequest,
            AdminLoginResponse,
            DrawStateKind,
            RevealFrame,
            DrawResult,
            DrawSessionSnapshot,
            SubmitCodeRequest,
            SubmitCodeResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "draw", description = "Visitor draw sessions"),
        (name = "admin", description = "Product and access code management"),
    ),
    info(
        title = "Raffle Backend API",
        version = "1.0.0",
        description = "Access-code gated prize draw REST API"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
