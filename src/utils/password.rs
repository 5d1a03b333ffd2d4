use crate::error::{AppError, AppResult};
use bcrypt::verify;

/// Hashes fixtures for tests; production hashes come from `admin.password_hash`.
#[cfg(test)]
pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|e| AppError::InternalError(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::ConfigError(format!("admin password hash is unusable: {e}")))
}
