use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::User;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) user: User,
}

#[derive(Debug, Serialize)]
pub(crate) struct CurrentUserResponse {
    pub(crate) user: User,
}

/// Server clock as the legacy client expects it.
#[derive(Debug, Serialize)]
pub(crate) struct ServerTimeResponse {
    pub(crate) civil_time: String,
    pub(crate) civil_time_iso: String,
    pub(crate) utc_time: String,
    pub(crate) utc_offset: String,
}
