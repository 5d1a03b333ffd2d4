use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AdminLoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssuedCodesResponse {
    pub issued: Vec<super::AccessCode>,
    pub skipped: u32,
}
