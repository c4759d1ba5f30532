use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::User;
use crate::db::types::UserRole;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserCreate {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub(crate) password: String,
    pub(crate) role: UserRole,
    #[serde(default)]
    #[serde(alias = "name", alias = "fullName")]
    pub(crate) full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserCreated {
    pub(crate) user: User,
    pub(crate) total_students: i64,
    pub(crate) total_instructors: i64,
    pub(crate) warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserDeleted {
    pub(crate) message: String,
    pub(crate) remaining_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UsersResponse {
    pub(crate) users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentsResponse {
    pub(crate) students: Vec<User>,
}
