use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Exam;
use crate::db::types::ExamType;
use crate::services::grading::SubmittedAnswer;
use crate::services::presentation::QuestionView;

fn default_duration() -> i32 {
    10
}

fn default_points() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    pub(crate) course_id: i64,
    pub(crate) exam_type: ExamType,
    /// Civil UTC+3 time, or RFC 3339 with an explicit offset.
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[validate(range(min = 0.0, max = 100.0, message = "weight_percentage must be between 0 and 100"))]
    pub(crate) weight_percentage: f64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "weight_percentage must be between 0 and 100"))]
    pub(crate) weight_percentage: Option<f64>,
    #[serde(default)]
    pub(crate) start_time: Option<String>,
    #[serde(default)]
    pub(crate) end_time: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct OptionCreate {
    #[validate(length(min = 1, message = "option_text must not be empty"))]
    pub(crate) option_text: String,
    #[serde(default)]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: String,
    #[serde(default = "default_points")]
    #[validate(range(exclusive_min = 0.0, message = "points must be positive"))]
    pub(crate) points: f64,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answer_options: Vec<OptionCreate>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: Option<String>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "points must be positive"))]
    pub(crate) points: Option<f64>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answer_options: Option<Vec<OptionCreate>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamCreated {
    pub(crate) exam: Exam,
    pub(crate) midterm_count: usize,
    pub(crate) final_count: usize,
    pub(crate) warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamUpdated {
    pub(crate) message: String,
    pub(crate) exam: Exam,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamsResponse {
    pub(crate) exams: Vec<Exam>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionAdded {
    pub(crate) question: QuestionView,
    pub(crate) total_questions: i64,
    pub(crate) warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) question: QuestionView,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionDeleted {
    pub(crate) message: String,
    pub(crate) remaining_questions: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamQuestions {
    pub(crate) exam: Exam,
    pub(crate) questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AutoSubmitResponse {
    pub(crate) finalized: u64,
}
