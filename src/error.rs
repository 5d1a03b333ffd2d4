use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Please enter an access code")]
    EmptyInput,

    #[error("No products are registered for the draw")]
    NoProducts,

    #[error("Access code is invalid or has already been used")]
    InvalidOrUsedCode,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Failed to persist record: {0}")]
    Persist(String),

    #[error("Access code already exists or could not be stored: {0}")]
    DuplicateOrPersist(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Transport(format!("request timed out: {err}"))
        } else {
            AppError::Transport(err.to_string())
        }
    }
}

impl AppError {
    /// Stable machine-readable code used in the JSON error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::EmptyInput => "EMPTY_INPUT",
            AppError::NoProducts => "NO_PRODUCTS",
            AppError::InvalidOrUsedCode => "INVALID_OR_USED_CODE",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Upload(_) => "UPLOAD_ERROR",
            AppError::Persist(_) => "PERSIST_ERROR",
            AppError::DuplicateOrPersist(_) => "DUPLICATE_OR_PERSIST_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;

        let (status_code, message) = match self {
            AppError::EmptyInput | AppError::InvalidOrUsedCode => {
                log::warn!("Draw rejected: {self}");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::NoProducts => {
                log::warn!("Draw rejected: {self}");
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                (StatusCode::UNAUTHORIZED, "Invalid access token".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::DuplicateOrPersist(msg) => {
                log::warn!("Access code insert rejected: {msg}");
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Transport(msg) => {
                log::error!("Transport error: {msg}");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Upload(msg) | AppError::Persist(msg) => {
                log::error!("Catalog write failed: {msg}");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}
