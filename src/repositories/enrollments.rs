use time::PrimitiveDateTime;

use crate::db::models::Enrollment;

const COLUMNS: &str = "id, student_id, course_id, enrollment_date";

#[derive(Debug, Clone)]
pub(crate) struct CreateEnrollment {
    pub(crate) student_id: i64,
    pub(crate) course_id: i64,
    pub(crate) enrollment_date: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!("SELECT {COLUMNS} FROM student_courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_for(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: i64,
    course_id: i64,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM student_courses WHERE student_id = $1 AND course_id = $2"
    ))
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list(
    executor: impl sqlx::PgExecutor<'_>,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!("SELECT {COLUMNS} FROM student_courses ORDER BY id"))
        .fetch_all(executor)
        .await
}

pub(crate) async fn list_by_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: i64,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM student_courses WHERE student_id = $1 ORDER BY id"
    ))
    .bind(student_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_course(
    executor: impl sqlx::PgExecutor<'_>,
    course_id: i64,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM student_courses WHERE course_id = $1 ORDER BY id"
    ))
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateEnrollment,
) -> Result<Enrollment, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "INSERT INTO student_courses (student_id, course_id, enrollment_date)
         VALUES ($1,$2,$3)
         RETURNING {COLUMNS}"
    ))
    .bind(params.student_id)
    .bind(params.course_id)
    .bind(params.enrollment_date)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM student_courses WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_by_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM student_courses WHERE student_id = $1")
        .bind(student_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
