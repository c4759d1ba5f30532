use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate_payload;
use crate::core::clock::{self, CIVIL_OFFSET};
use crate::core::security;
use crate::core::state::AppState;
use crate::schemas::auth::{CurrentUserResponse, LoginRequest, ServerTimeResponse, TokenResponse};
use crate::services::access;

const OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/time", get(server_time))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate_payload(&payload)?;

    let user = access::authenticate(state.store(), &payload.email, &payload.password)
        .await?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    let token = security::create_access_token(user.id, user.role, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(user_id = user.id, role = user.role.as_str(), "user logged in");
    Ok(Json(TokenResponse { access_token: token, token_type: "bearer".to_string(), user }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse { user })
}

async fn server_time(State(state): State<AppState>) -> Result<Json<ServerTimeResponse>, ApiError> {
    let now = state.clock().now();
    let civil_time = clock::format_civil_minutes(now);
    let civil_time_iso =
        now.format(&Rfc3339).map_err(|e| ApiError::internal(e, "Failed to format time"))?;
    let utc_offset = CIVIL_OFFSET
        .format(OFFSET_FORMAT)
        .map_err(|e| ApiError::internal(e, "Failed to format time"))?;

    Ok(Json(ServerTimeResponse {
        civil_time,
        civil_time_iso,
        utc_time: clock::format_utc(clock::to_primitive_utc(now)),
        utc_offset,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::test_support::{self, bearer_token, json_request, read_json, seed};

    #[tokio::test]
    async fn login_issues_a_token_that_resolves_to_the_user() {
        let scenario = seed::ExamScenario::open_now().await;
        let app = test_support::test_app(&scenario).app;

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({ "email": "STUDENT@uni.test", "password": seed::PASSWORD })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["user"]["role"], "student");
        assert!(json["user"].get("hashed_password").is_none());

        let token = json["access_token"].as_str().unwrap().to_string();
        let response = app
            .oneshot(json_request(Method::GET, "/api/v1/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["user"]["id"], scenario.student.id);
    }

    #[tokio::test]
    async fn bad_credentials_and_tokens_are_unauthorized() {
        let scenario = seed::ExamScenario::open_now().await;
        let test_app = test_support::test_app(&scenario);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({ "email": "student@uni.test", "password": "nope" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await["code"], "unauthorized");

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/auth/me", Some("garbage"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let ghost = crate::db::models::User { id: 9_999, ..scenario.student.clone() };
        let token = bearer_token(&ghost, test_app.state.settings());
        let response = test_app
            .app
            .oneshot(json_request(Method::GET, "/api/v1/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn server_time_reports_civil_and_utc() {
        let scenario = seed::ExamScenario::open_now().await;
        let app = test_support::test_app(&scenario).app;

        let response =
            app.oneshot(json_request(Method::GET, "/api/v1/auth/time", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["civil_time"], "2025-03-10T12:00");
        assert_eq!(json["civil_time_iso"], "2025-03-10T12:00:00+03:00");
        assert_eq!(json["utc_time"], "2025-03-10T09:00:00Z");
        assert_eq!(json["utc_offset"], "+03:00");
    }
}
