use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::schemas::course::{CourseGradeResponse, CoursesResponse};
use crate::schemas::exam::SubmitRequest;
use crate::services::attempts::{
    self, ActiveExams, ExamDetails, StartedAttempt, SubmittedAttempt,
};
use crate::services::errors::CoreError;
use crate::services::grading;
use crate::services::statistics::{self, StudentExamResult, StudentOverview};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/exams", get(list_exams))
        .route("/exams/:exam_id", get(exam_details))
        .route("/exams/:exam_id/start", post(start_exam))
        .route("/exams/:exam_id/submit", post(submit_exam))
        .route("/exams/:exam_id/result", get(exam_result))
        .route("/courses/:course_id/grade", get(course_grade))
        .route("/grades", get(grades))
}

async fn list_courses(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
) -> Result<Json<CoursesResponse>, ApiError> {
    let courses = attempts::enrolled_courses(state.store(), student.id).await?;
    Ok(Json(CoursesResponse { courses }))
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
) -> Result<Json<ActiveExams>, ApiError> {
    Ok(Json(attempts::active_exams(state.store(), state.clock(), student.id).await?))
}

async fn exam_details(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(exam_id): Path<i64>,
) -> Result<Json<ExamDetails>, ApiError> {
    Ok(Json(attempts::exam_details(state.store(), state.clock(), exam_id, student.id).await?))
}

async fn start_exam(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(exam_id): Path<i64>,
) -> Result<(StatusCode, Json<StartedAttempt>), ApiError> {
    let started = attempts::start_attempt(
        state.store(),
        state.clock(),
        state.settings().policy(),
        exam_id,
        student.id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn submit_exam(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(exam_id): Path<i64>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmittedAttempt>, ApiError> {
    let submitted =
        attempts::submit_attempt(state.store(), state.clock(), exam_id, student.id, &payload.answers)
            .await?;
    Ok(Json(submitted))
}

async fn exam_result(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(exam_id): Path<i64>,
) -> Result<Json<StudentExamResult>, ApiError> {
    let result =
        statistics::student_exam_result(state.store(), state.clock(), exam_id, student.id).await?;
    Ok(Json(result))
}

async fn course_grade(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseGradeResponse>, ApiError> {
    let course = attempts::enrolled_courses(state.store(), student.id)
        .await?
        .into_iter()
        .find(|view| view.course.id == course_id)
        .ok_or_else(|| CoreError::forbidden("You are not enrolled in this course"))?;
    let grade = grading::course_grade(state.store(), student.id, course_id).await?;
    Ok(Json(CourseGradeResponse { course, grade }))
}

async fn grades(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
) -> Result<Json<StudentOverview>, ApiError> {
    Ok(Json(statistics::student_overview(state.store(), student.id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use time::Duration;
    use tower::ServiceExt;

    use crate::test_support::{self, bearer_token, json_request, read_json, seed};

    #[tokio::test]
    async fn full_attempt_flow_over_http() {
        let scenario = seed::ExamScenario::open_now().await;
        let test_app = test_support::test_app(&scenario);
        let token = bearer_token(&scenario.student, test_app.state.settings());
        let exam_uri = format!("/api/v1/student/exams/{}", scenario.exam.id);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/student/exams", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["exams"][0]["can_start"], true);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::POST, &format!("{exam_uri}/start"), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let started = read_json(response).await;
        assert_eq!(started["questions"].as_array().unwrap().len(), 5);
        assert_eq!(started["duration_minutes"], 30);
        assert!(started["questions"][0]["answer_options"][0].get("is_correct").is_none());

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::POST, &format!("{exam_uri}/start"), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "eligibility_error");

        let answers: Vec<serde_json::Value> = scenario
            .questions
            .iter()
            .take(3)
            .map(|entry| {
                serde_json::json!({
                    "question_id": entry.question.id,
                    "selected_option_id": entry.options[0].id,
                })
            })
            .collect();
        scenario.clock.advance(Duration::minutes(10));
        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("{exam_uri}/submit"),
                Some(&token),
                Some(serde_json::json!({ "answers": answers })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let submitted = read_json(response).await;
        assert_eq!(submitted["attempt"]["total_score"], 3.0);
        assert_eq!(submitted["percentage"], 60.0);
        assert_eq!(submitted["submitted_late"], false);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("{exam_uri}/submit"),
                Some(&token),
                Some(serde_json::json!({ "answers": [] })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(read_json(response).await["code"], "duplicate_submission");

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, &format!("{exam_uri}/result"), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result = read_json(response).await;
        assert_eq!(result["my_result"]["score"], 3.0);

        let grade_uri = format!("/api/v1/student/courses/{}/grade", scenario.course.id);
        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, &grade_uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["course"]["code"], scenario.course.code.as_str());
        assert_eq!(json["grade"]["midterm_score"], 60.0);
        assert_eq!(json["grade"]["final_grade"], 60.0);

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/student/courses/9999/grade", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = test_app
            .app
            .oneshot(json_request(Method::GET, "/api/v1/student/grades", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_roles_are_rejected() {
        let scenario = seed::ExamScenario::open_now().await;
        let test_app = test_support::test_app(&scenario);
        let token = bearer_token(&scenario.instructor, test_app.state.settings());

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/student/courses", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_json(response).await["code"], "authorization_error");

        let response = test_app
            .app
            .oneshot(json_request(Method::GET, "/api/v1/student/courses", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
