use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DrawStateKind {
    Idle,
    Validating,
    Revealing,
    Settled,
}

/// One animation tick: the product currently shown in the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RevealFrame {
    /// 1-based tick number
    pub tick: u32,
    pub product: Product,
}

/// Outcome of a settled draw. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DrawResult {
    pub winner: Product,
    pub drawn_at: DateTime<Utc>,
}

/// Point-in-time view of a visitor session for polling clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawSessionSnapshot {
    pub session_id: Uuid,
    pub state: DrawStateKind,
    pub product_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<RevealFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DrawResult>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmitCodeRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitCodeResponse {
    /// false when a draw was already running or settled in this session
    pub accepted: bool,
    pub session: DrawSessionSnapshot,
}
