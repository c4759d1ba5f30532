use time::PrimitiveDateTime;

use crate::db::models::ExamAttempt;

const COLUMNS: &str = "id, exam_id, student_id, start_time, end_time, submitted_at, total_score";

#[derive(Debug, Clone)]
pub(crate) struct CreateAttempt {
    pub(crate) exam_id: i64,
    pub(crate) student_id: i64,
    pub(crate) start_time: PrimitiveDateTime,
}

pub(crate) async fn find_for(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: i64,
    student_id: i64,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE exam_id = $1 AND student_id = $2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

/// Relies on `unique_exam_student`; a lost race yields `None` instead of an error.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "INSERT INTO exam_attempts (exam_id, student_id, start_time, total_score)
         VALUES ($1,$2,$3,0)
         ON CONFLICT ON CONSTRAINT unique_exam_student DO NOTHING
         RETURNING {COLUMNS}"
    ))
    .bind(params.exam_id)
    .bind(params.student_id)
    .bind(params.start_time)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: i64,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE exam_id = $1 ORDER BY id"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_open(
    executor: impl sqlx::PgExecutor<'_>,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE submitted_at IS NULL ORDER BY id"
    ))
    .fetch_all(executor)
    .await
}

pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: i64,
    total_score: f64,
    at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts
         SET total_score = $1, submitted_at = $2, end_time = $2
         WHERE id = $3 AND submitted_at IS NULL",
    )
    .bind(total_score)
    .bind(at)
    .bind(attempt_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
