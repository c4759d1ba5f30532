use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamType;

pub(crate) const COLUMNS: &str = "\
    id, course_id, instructor_id, exam_type, start_time, end_time, \
    duration_minutes, weight_percentage, created_at";

#[derive(Debug, Clone)]
pub(crate) struct CreateExam {
    pub(crate) course_id: i64,
    pub(crate) instructor_id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) weight_percentage: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_by_course(
    executor: impl sqlx::PgExecutor<'_>,
    course_id: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE course_id = $1 ORDER BY start_time, id"
    ))
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_instructor(
    executor: impl sqlx::PgExecutor<'_>,
    instructor_id: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE instructor_id = $1 ORDER BY start_time, id"
    ))
    .bind(instructor_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateExam,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            course_id, instructor_id, exam_type, start_time, end_time,
            duration_minutes, weight_percentage, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(params.course_id)
    .bind(params.instructor_id)
    .bind(params.exam_type)
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(params.duration_minutes)
    .bind(params.weight_percentage)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

/// Writes the mutable scheduling fields back.
pub(crate) async fn update_schedule(
    executor: impl sqlx::PgExecutor<'_>,
    exam: &Exam,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exams SET
            start_time = $1,
            end_time = $2,
            duration_minutes = $3,
            weight_percentage = $4
         WHERE id = $5",
    )
    .bind(exam.start_time)
    .bind(exam.end_time)
    .bind(exam.duration_minutes)
    .bind(exam.weight_percentage)
    .bind(exam.id)
    .execute(executor)
    .await?;
    Ok(())
}
