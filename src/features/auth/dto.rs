use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::model::{AuthenticatedUser, Role};

/// DTO for /auth/me response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponseDto {
    pub user_id: String,
    pub role: Role,
    pub department: Option<String>,
    pub can_file_reports: bool,
    pub can_change_status: bool,
}

impl From<AuthenticatedUser> for MeResponseDto {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            can_file_reports: user.role != Role::Staff,
            can_change_status: user.role != Role::Citizen,
            user_id: user.user_id,
            role: user.role,
            department: user.department,
        }
    }
}
