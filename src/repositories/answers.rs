use crate::db::models::StudentAnswer;

const COLUMNS: &str = "id, attempt_id, question_id, selected_option_id, is_correct, points_earned";

#[derive(Debug, Clone)]
pub(crate) struct CreateAnswer {
    pub(crate) attempt_id: i64,
    pub(crate) question_id: i64,
    pub(crate) selected_option_id: Option<i64>,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: i64,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {COLUMNS} FROM student_answers WHERE attempt_id = $1 ORDER BY id"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn delete_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM student_answers WHERE attempt_id = $1")
        .bind(attempt_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAnswer,
) -> Result<StudentAnswer, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "INSERT INTO student_answers (
            attempt_id, question_id, selected_option_id, is_correct, points_earned
        ) VALUES ($1,$2,$3,$4,$5)
        RETURNING {COLUMNS}"
    ))
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.selected_option_id)
    .bind(params.is_correct)
    .bind(params.points_earned)
    .fetch_one(executor)
    .await
}
