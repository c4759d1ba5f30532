use serde::Serialize;

use crate::core::security;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories::Store;
use crate::services::errors::{CoreError, CoreResult};

/// Authenticated caller with the role currently stored for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Principal {
    pub(crate) user_id: i64,
    pub(crate) role: UserRole,
}

pub(crate) fn require_role(principal: &Principal, allowed: &[UserRole]) -> CoreResult<()> {
    if allowed.contains(&principal.role) {
        return Ok(());
    }
    Err(CoreError::forbidden(format!(
        "Role '{}' is not permitted for this operation",
        principal.role.as_str()
    )))
}

/// Checks email and password; `None` covers both an unknown email and a wrong password.
pub(crate) async fn authenticate(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> CoreResult<Option<User>> {
    let email = email.trim().to_lowercase();
    let mut uow = store.begin().await?;
    let Some(user) = uow.find_user_by_email(&email).await? else {
        return Ok(None);
    };
    if !security::verify_password(password, &user.hashed_password)? {
        tracing::info!(user_id = user.id, "login rejected");
        return Ok(None);
    }
    Ok(Some(user))
}
