use std::collections::HashMap;

use crate::db::models::{AnswerOption, Question, QuestionWithOptions};
use crate::db::types::QuestionType;

const COLUMNS: &str = "id, exam_id, question_text, question_type, points";
const OPTION_COLUMNS: &str = "id, question_id, option_text, is_correct";

#[derive(Debug, Clone)]
pub(crate) struct CreateQuestion {
    pub(crate) exam_id: i64,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct CreateOption {
    pub(crate) question_id: i64,
    pub(crate) option_text: String,
    pub(crate) is_correct: bool,
}

pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY id"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn count_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn list_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_ids: &[i64],
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    sqlx::query_as::<_, AnswerOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM answer_options WHERE question_id = ANY($1) ORDER BY id"
    ))
    .bind(question_ids)
    .fetch_all(executor)
    .await
}

/// Attaches options to their questions, keeping both lists in their given order.
pub(crate) fn attach_options(
    questions: Vec<Question>,
    options: Vec<AnswerOption>,
) -> Vec<QuestionWithOptions> {
    let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }
    questions
        .into_iter()
        .map(|question| {
            let options = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithOptions { question, options }
        })
        .collect()
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (exam_id, question_text, question_type, points)
         VALUES ($1,$2,$3,$4)
         RETURNING {COLUMNS}"
    ))
    .bind(params.exam_id)
    .bind(params.question_text)
    .bind(params.question_type)
    .bind(params.points)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    question: &Question,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE questions SET question_text = $1, points = $2 WHERE id = $3")
        .bind(&question.question_text)
        .bind(question.points)
        .bind(question.id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn create_option(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateOption,
) -> Result<AnswerOption, sqlx::Error> {
    sqlx::query_as::<_, AnswerOption>(&format!(
        "INSERT INTO answer_options (question_id, option_text, is_correct)
         VALUES ($1,$2,$3)
         RETURNING {OPTION_COLUMNS}"
    ))
    .bind(params.question_id)
    .bind(params.option_text)
    .bind(params.is_correct)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM answer_options WHERE question_id = $1")
        .bind(question_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
