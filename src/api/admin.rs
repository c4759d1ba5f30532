use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::schemas::course::{
    AssignmentCreate, AssignmentCreated, AssignmentsResponse, CourseCreate, CourseCreated,
    CoursesResponse, DepartmentCreate, DepartmentResponse, DepartmentsResponse, RemovalResponse,
};
use crate::schemas::exam::AutoSubmitResponse;
use crate::schemas::user::{UserCreate, UserCreated, UserDeleted, UserListQuery, UsersResponse};
use crate::schemas::MessageResponse;
use crate::services::{admin, attempts};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:user_id", delete(delete_user))
        .route("/departments", get(list_departments).post(create_department))
        .route("/departments/:department_id", delete(delete_department))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/:course_id", delete(delete_course))
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route("/assignments/:assignment_id", delete(delete_assignment))
        .route("/attempts/auto-submit", post(auto_submit))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Json(payload): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserCreated>), ApiError> {
    validate_payload(&payload)?;
    let created =
        admin::create_user(state.store(), state.clock(), state.settings().policy(), &payload)
            .await?;
    tracing::info!(admin_id = actor.id, user_id = created.user.id, "admin created user");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_users(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = admin::list_users(state.store(), query.role).await?;
    Ok(Json(UsersResponse { users }))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Path(user_id): Path<i64>,
) -> Result<Json<UserDeleted>, ApiError> {
    let deleted = admin::delete_user(state.store(), state.settings().policy(), user_id).await?;
    tracing::info!(admin_id = actor.id, user_id, "admin deleted user");
    Ok(Json(deleted))
}

async fn create_department(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Json(payload): Json<DepartmentCreate>,
) -> Result<(StatusCode, Json<DepartmentResponse>), ApiError> {
    validate_payload(&payload)?;
    let department = admin::create_department(state.store(), &payload).await?;
    tracing::info!(
        admin_id = actor.id,
        department_id = department.id,
        "admin created department"
    );
    Ok((StatusCode::CREATED, Json(DepartmentResponse { department })))
}

async fn list_departments(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<DepartmentsResponse>, ApiError> {
    let departments = admin::list_departments(state.store()).await?;
    Ok(Json(DepartmentsResponse { departments }))
}

async fn delete_department(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Path(department_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    admin::delete_department(state.store(), department_id).await?;
    tracing::info!(admin_id = actor.id, department_id, "admin deleted department");
    Ok(Json(MessageResponse { message: "Department deleted".to_string() }))
}

async fn create_course(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseCreated>), ApiError> {
    validate_payload(&payload)?;
    let created = admin::create_course(state.store(), state.settings().policy(), &payload).await?;
    tracing::info!(
        admin_id = actor.id,
        course_id = created.course.course.id,
        "admin created course"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_courses(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<CoursesResponse>, ApiError> {
    let courses = admin::list_courses(state.store()).await?;
    Ok(Json(CoursesResponse { courses }))
}

async fn delete_course(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Path(course_id): Path<i64>,
) -> Result<Json<RemovalResponse>, ApiError> {
    let removed = admin::delete_course(state.store(), state.settings().policy(), course_id).await?;
    tracing::info!(admin_id = actor.id, course_id, "admin deleted course");
    Ok(Json(removed))
}

async fn create_assignment(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Json(payload): Json<AssignmentCreate>,
) -> Result<(StatusCode, Json<AssignmentCreated>), ApiError> {
    let policy = state.settings().policy();
    tracing::info!(admin_id = actor.id, assignment = ?payload, "admin assignment requested");
    match payload {
        AssignmentCreate::StudentCourse { student_id, course_id } => {
            let created =
                admin::enroll_student(state.store(), state.clock(), policy, student_id, course_id)
                    .await?;
            Ok((StatusCode::CREATED, Json(AssignmentCreated::Enrollment(created))))
        }
        AssignmentCreate::InstructorCourse { instructor_id, course_id } => {
            let assigned =
                admin::assign_instructor(state.store(), policy, instructor_id, course_id).await?;
            Ok((StatusCode::OK, Json(AssignmentCreated::Instructor(assigned))))
        }
    }
}

async fn list_assignments(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let assignments = admin::list_enrollments(state.store()).await?;
    Ok(Json(AssignmentsResponse { assignments }))
}

async fn delete_assignment(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
    Path(assignment_id): Path<i64>,
) -> Result<Json<RemovalResponse>, ApiError> {
    let removed =
        admin::delete_enrollment(state.store(), state.settings().policy(), assignment_id).await?;
    tracing::info!(admin_id = actor.id, assignment_id, "admin deleted assignment");
    Ok(Json(removed))
}

/// Finalizes every open attempt whose deadline has passed.
async fn auto_submit(
    State(state): State<AppState>,
    CurrentAdmin(actor): CurrentAdmin,
) -> Result<Json<AutoSubmitResponse>, ApiError> {
    let finalized = attempts::auto_submit_expired(state.store(), state.clock()).await?;
    tracing::info!(admin_id = actor.id, finalized, "auto-submit sweep finished");
    Ok(Json(AutoSubmitResponse { finalized }))
}
