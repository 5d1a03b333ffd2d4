use crate::error::{AppError, AppResult};
use crate::models::AdminLoginResponse;
use crate::utils::{JwtService, verify_password};

/// Admin gate: the configured bcrypt hash is the only secret.
#[derive(Clone)]
pub struct AdminAuthService {
    password_hash: String,
    jwt: JwtService,
}

impl AdminAuthService {
    pub fn new(password_hash: String, jwt: JwtService) -> Self {
        Self { password_hash, jwt }
    }

    pub async fn login(&self, password: &str) -> AppResult<AdminLoginResponse> {
        if password.is_empty() {
            return Err(AppError::ValidationError("Password is required".into()));
        }

        let password = password.to_string();
        let hash = self.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::InternalError(format!("password check failed: {e}")))??;

        if !matches {
            return Err(AppError::AuthError("Incorrect admin password".into()));
        }

        log::info!("Admin signed in");
        Ok(AdminLoginResponse {
            access_token: self.jwt.generate_admin_token()?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.expires_in(),
        })
    }
}
