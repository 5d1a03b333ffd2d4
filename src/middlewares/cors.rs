use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| true)
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        // the admin screen sends raw image bodies with custom content types
        .allow_any_header()
        .max_age(3600)
}
