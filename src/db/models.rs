use serde::Serialize;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{ExamType, QuestionType, UserRole};

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: i64,
    pub(crate) email: String,
    #[serde(skip_serializing)]
    pub(crate) hashed_password: String,
    pub(crate) role: UserRole,
    pub(crate) full_name: Option<String>,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize")]
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct Department {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) code: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: i64,
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) department_id: i64,
    pub(crate) instructor_id: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) id: i64,
    pub(crate) student_id: i64,
    pub(crate) course_id: i64,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize")]
    pub(crate) enrollment_date: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: i64,
    pub(crate) course_id: i64,
    pub(crate) instructor_id: i64,
    pub(crate) exam_type: ExamType,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize")]
    pub(crate) start_time: PrimitiveDateTime,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize")]
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) weight_percentage: f64,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize")]
    pub(crate) created_at: PrimitiveDateTime,
}

impl Exam {
    /// Inclusive on both ends.
    pub(crate) fn is_open_at(&self, now: PrimitiveDateTime) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Earliest of the attempt's duration budget and the exam window end.
    pub(crate) fn attempt_deadline(&self, started_at: PrimitiveDateTime) -> PrimitiveDateTime {
        let budget = started_at + time::Duration::minutes(self.duration_minutes as i64);
        if budget < self.end_time {
            budget
        } else {
            self.end_time
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: i64,
    pub(crate) exam_id: i64,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct AnswerOption {
    pub(crate) id: i64,
    pub(crate) question_id: i64,
    pub(crate) option_text: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: i64,
    pub(crate) exam_id: i64,
    pub(crate) student_id: i64,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize")]
    pub(crate) start_time: PrimitiveDateTime,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize_option")]
    pub(crate) end_time: Option<PrimitiveDateTime>,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize_option")]
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) total_score: f64,
}

impl ExamAttempt {
    pub(crate) fn is_finalized(&self) -> bool {
        self.submitted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct StudentAnswer {
    pub(crate) id: i64,
    pub(crate) attempt_id: i64,
    pub(crate) question_id: i64,
    pub(crate) selected_option_id: Option<i64>,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
}

/// A question together with its options, in stored order.
#[derive(Debug, Clone)]
pub(crate) struct QuestionWithOptions {
    pub(crate) question: Question,
    pub(crate) options: Vec<AnswerOption>,
}
