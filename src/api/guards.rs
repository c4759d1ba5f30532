use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::services::access::{self, Principal};

/// The caller behind a valid bearer token, loaded fresh from the store.
pub(crate) struct CurrentUser(pub(crate) User);

pub(crate) struct CurrentStudent(pub(crate) User);
pub(crate) struct CurrentInstructor(pub(crate) User);
pub(crate) struct CurrentDepartmentHead(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;
        let user_id =
            claims.user_id().ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let mut uow = app_state
            .store()
            .begin()
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;
        let user = uow
            .find_user(user_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        Ok(CurrentUser(user))
    }
}

/// Role checks use the stored role; a token minted before a role change carries the old one.
async fn user_with_role(
    parts: &mut Parts,
    state: &AppState,
    allowed: &[UserRole],
) -> Result<User, ApiError> {
    let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
    let principal = Principal { user_id: user.id, role: user.role };
    access::require_role(&principal, allowed)?;
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, &[UserRole::Student]).await.map(CurrentStudent)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentInstructor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, &[UserRole::Instructor]).await.map(CurrentInstructor)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentDepartmentHead {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, &[UserRole::DepartmentHead]).await.map(CurrentDepartmentHead)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, &[UserRole::Admin]).await.map(CurrentAdmin)
    }
}
