use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentDepartmentHead;
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::schemas::course::CoursesResponse;
use crate::schemas::user::StudentsResponse;
use crate::services::admin;
use crate::services::statistics::{self, ClassStatistics, CourseDetail, DepartmentOverview};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/students", get(list_students))
        .route("/statistics", get(overview))
        .route("/statistics/summary", get(summary))
        .route("/courses/:course_id/statistics", get(course_statistics))
}

async fn list_courses(
    State(state): State<AppState>,
    _head: CurrentDepartmentHead,
) -> Result<Json<CoursesResponse>, ApiError> {
    let courses = admin::list_courses(state.store()).await?;
    Ok(Json(CoursesResponse { courses }))
}

async fn list_students(
    State(state): State<AppState>,
    _head: CurrentDepartmentHead,
) -> Result<Json<StudentsResponse>, ApiError> {
    let students = admin::list_users(state.store(), Some(UserRole::Student)).await?;
    Ok(Json(StudentsResponse { students }))
}

async fn overview(
    State(state): State<AppState>,
    CurrentDepartmentHead(head): CurrentDepartmentHead,
) -> Result<Json<DepartmentOverview>, ApiError> {
    let overview = statistics::department_overview(state.store()).await?;
    tracing::info!(
        user_id = head.id,
        courses = overview.course_statistics.len(),
        "department overview served"
    );
    Ok(Json(overview))
}

async fn summary(
    State(state): State<AppState>,
    _head: CurrentDepartmentHead,
) -> Result<Json<ClassStatistics>, ApiError> {
    Ok(Json(statistics::class_statistics(state.store()).await?))
}

async fn course_statistics(
    State(state): State<AppState>,
    _head: CurrentDepartmentHead,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(statistics::course_detail(state.store(), course_id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::db::types::UserRole;
    use crate::test_support::{self, bearer_token, json_request, read_json, seed};

    #[tokio::test]
    async fn department_head_sees_overview_and_course_detail() {
        let scenario = seed::ExamScenario::open_now().await;
        seed::finalized_attempt(&scenario, scenario.exam.id, scenario.student.id, 4.0).await;
        let head = seed::user(scenario.store.as_ref(), "head@uni.test", UserRole::DepartmentHead).await;
        let test_app = test_support::test_app(&scenario);
        let token = bearer_token(&head, test_app.state.settings());

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/department-head/statistics", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["general_statistics"]["total_students"], 1);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/department-head/courses/{}/statistics", scenario.course.id),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                "/api/v1/department-head/courses/9999/statistics",
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                "/api/v1/department-head/statistics/summary",
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        let json = read_json(response).await;
        assert_eq!(json["total_courses"], 1);
        assert_eq!(json["total_instructors"], 1);

        let response = test_app
            .app
            .oneshot(json_request(Method::GET, "/api/v1/department-head/students", Some(&token), None))
            .await
            .unwrap();
        let json = read_json(response).await;
        assert_eq!(json["students"].as_array().unwrap().len(), 1);
    }
}
