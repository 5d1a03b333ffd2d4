use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::access_code_entity;

/// Single-use code that unlocks one draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccessCode {
    pub id: i64,
    pub code: String,
}

impl From<access_code_entity::Model> for AccessCode {
    fn from(m: access_code_entity::Model) -> Self {
        AccessCode {
            id: m.id,
            code: m.code,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct CreateAccessCodeRequest {
    /// Leave empty to have a code generated
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssueAccessCodesRequest {
    /// Number of codes to generate (1-500)
    pub count: u32,
}
