//! Question views handed to clients.
//!
//! Students get a fresh shuffle of questions and options on every read; nothing about the
//! order is stored.

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::db::models::{Course, Department, QuestionWithOptions, User};
use crate::db::types::QuestionType;
use crate::repositories::UnitOfWork;
use crate::services::errors::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disclosure {
    Hidden,
    Revealed,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OptionView {
    pub(crate) id: i64,
    pub(crate) question_id: i64,
    pub(crate) option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) id: i64,
    pub(crate) exam_id: i64,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
    #[serde(rename = "answer_options")]
    pub(crate) options: Vec<OptionView>,
    /// Present only on views that carry a student's stored answer; `Some(None)` renders null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) selected_option_id: Option<Option<i64>>,
}

impl QuestionView {
    fn from_entry(entry: QuestionWithOptions, disclosure: Disclosure) -> Self {
        let options = entry
            .options
            .into_iter()
            .map(|option| OptionView {
                id: option.id,
                question_id: option.question_id,
                option_text: option.option_text,
                is_correct: match disclosure {
                    Disclosure::Revealed => Some(option.is_correct),
                    Disclosure::Hidden => None,
                },
            })
            .collect();

        Self {
            id: entry.question.id,
            exam_id: entry.question.exam_id,
            question_text: entry.question.question_text,
            question_type: entry.question.question_type,
            points: entry.question.points,
            options,
            selected_option_id: None,
        }
    }
}

/// Shuffles questions and each question's options.
pub(crate) fn shuffled(
    questions: Vec<QuestionWithOptions>,
    disclosure: Disclosure,
) -> Vec<QuestionView> {
    let mut rng = rand::thread_rng();
    let mut views: Vec<QuestionView> =
        questions.into_iter().map(|entry| QuestionView::from_entry(entry, disclosure)).collect();

    views.shuffle(&mut rng);
    for view in &mut views {
        view.options.shuffle(&mut rng);
    }
    views
}

/// Stored order, used for authoring.
pub(crate) fn in_stored_order(
    questions: Vec<QuestionWithOptions>,
    disclosure: Disclosure,
) -> Vec<QuestionView> {
    questions.into_iter().map(|entry| QuestionView::from_entry(entry, disclosure)).collect()
}

/// A course with its department and instructor inlined.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CourseView {
    #[serde(flatten)]
    pub(crate) course: Course,
    pub(crate) department: Option<Department>,
    pub(crate) instructor: Option<User>,
}

pub(crate) async fn course_view(uow: &mut dyn UnitOfWork, course: Course) -> CoreResult<CourseView> {
    let department = uow.find_department(course.department_id).await?;
    let instructor = uow.find_user(course.instructor_id).await?;
    Ok(CourseView { course, department, instructor })
}

pub(crate) async fn course_views(
    uow: &mut dyn UnitOfWork,
    courses: Vec<Course>,
) -> CoreResult<Vec<CourseView>> {
    let mut views = Vec::with_capacity(courses.len());
    for course in courses {
        views.push(course_view(uow, course).await?);
    }
    Ok(views)
}
