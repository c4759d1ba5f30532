use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentInstructor;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::schemas::course::{CourseRoster, CoursesResponse};
use crate::schemas::exam::{
    ExamCreate, ExamCreated, ExamQuestions, ExamUpdate, ExamUpdated, ExamsResponse,
    QuestionAdded, QuestionCreate, QuestionDeleted, QuestionResponse, QuestionUpdate,
};
use crate::services::exams;
use crate::services::statistics::{self, CourseStatistics, ExamResults};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/:course_id/students", get(course_students))
        .route("/courses/:course_id/statistics", get(course_statistics))
        .route("/exams", get(list_exams).post(create_exam))
        .route("/exams/:exam_id", put(update_exam))
        .route("/exams/:exam_id/questions", get(list_questions).post(add_question))
        .route("/exams/:exam_id/results", get(exam_results))
        .route("/questions/:question_id", put(update_question).delete(delete_question))
}

async fn list_courses(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
) -> Result<Json<CoursesResponse>, ApiError> {
    let courses = exams::list_own_courses(state.store(), instructor.id).await?;
    Ok(Json(CoursesResponse { courses }))
}

async fn course_students(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseRoster>, ApiError> {
    Ok(Json(exams::course_students(state.store(), instructor.id, course_id).await?))
}

async fn course_statistics(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseStatistics>, ApiError> {
    exams::ensure_course_owner(state.store(), instructor.id, course_id).await?;
    Ok(Json(statistics::course_statistics(state.store(), course_id).await?))
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
) -> Result<Json<ExamsResponse>, ApiError> {
    let exams = exams::list_own_exams(state.store(), instructor.id).await?;
    Ok(Json(ExamsResponse { exams }))
}

async fn create_exam(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamCreated>), ApiError> {
    validate_payload(&payload)?;
    let created = exams::create_exam(state.store(), state.clock(), instructor.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_exam(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(exam_id): Path<i64>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamUpdated>, ApiError> {
    validate_payload(&payload)?;
    let updated =
        exams::update_exam(state.store(), state.clock(), instructor.id, exam_id, &payload).await?;
    Ok(Json(updated))
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(exam_id): Path<i64>,
) -> Result<Json<ExamQuestions>, ApiError> {
    Ok(Json(exams::exam_questions(state.store(), instructor.id, exam_id).await?))
}

async fn add_question(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(exam_id): Path<i64>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionAdded>), ApiError> {
    validate_payload(&payload)?;
    let added = exams::add_question(
        state.store(),
        state.settings().policy(),
        instructor.id,
        exam_id,
        &payload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(added)))
}

async fn update_question(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(question_id): Path<i64>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    validate_payload(&payload)?;
    let question =
        exams::update_question(state.store(), instructor.id, question_id, &payload).await?;
    Ok(Json(QuestionResponse { question }))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(question_id): Path<i64>,
) -> Result<Json<QuestionDeleted>, ApiError> {
    let remaining_questions = exams::delete_question(
        state.store(),
        state.settings().policy(),
        instructor.id,
        question_id,
    )
    .await?;
    Ok(Json(QuestionDeleted { message: "Question deleted".to_string(), remaining_questions }))
}

async fn exam_results(
    State(state): State<AppState>,
    CurrentInstructor(instructor): CurrentInstructor,
    Path(exam_id): Path<i64>,
) -> Result<Json<ExamResults>, ApiError> {
    Ok(Json(statistics::exam_results(state.store(), exam_id, instructor.id).await?))
}
