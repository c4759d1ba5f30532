use crate::db::models::Course;

const COLUMNS: &str = "id, code, name, department_id, instructor_id";

#[derive(Debug, Clone)]
pub(crate) struct CreateCourse {
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) department_id: i64,
    pub(crate) instructor_id: i64,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_code(
    executor: impl sqlx::PgExecutor<'_>,
    code: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE code = $1"))
        .bind(code)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list(executor: impl sqlx::PgExecutor<'_>) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses ORDER BY id"))
        .fetch_all(executor)
        .await
}

pub(crate) async fn list_by_instructor(
    executor: impl sqlx::PgExecutor<'_>,
    instructor_id: i64,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COLUMNS} FROM courses WHERE instructor_id = $1 ORDER BY id"
    ))
    .bind(instructor_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_department(
    executor: impl sqlx::PgExecutor<'_>,
    department_id: i64,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COLUMNS} FROM courses WHERE department_id = $1 ORDER BY id"
    ))
    .bind(department_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateCourse,
) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (code, name, department_id, instructor_id)
         VALUES ($1,$2,$3,$4)
         RETURNING {COLUMNS}"
    ))
    .bind(params.code)
    .bind(params.name)
    .bind(params.department_id)
    .bind(params.instructor_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn set_instructor(
    executor: impl sqlx::PgExecutor<'_>,
    course_id: i64,
    instructor_id: i64,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET instructor_id = $1 WHERE id = $2 RETURNING {COLUMNS}"
    ))
    .bind(instructor_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn delete_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
