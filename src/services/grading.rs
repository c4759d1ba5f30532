//! Scoring of single-choice answers and aggregation of exam percentages into course grades.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::models::QuestionWithOptions;
use crate::db::types::ExamType;
use crate::repositories::{Store, UnitOfWork};
use crate::services::errors::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: i64,
    #[serde(default)]
    pub(crate) selected_option_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoredAnswer {
    pub(crate) question_id: i64,
    pub(crate) selected_option_id: Option<i64>,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttemptScore {
    pub(crate) answers: Vec<ScoredAnswer>,
    pub(crate) total_score: f64,
    pub(crate) max_points: f64,
}

pub(crate) fn max_points(questions: &[QuestionWithOptions]) -> f64 {
    questions.iter().map(|entry| entry.question.points).sum()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `score / max * 100`, or 0 when the exam carries no points.
pub(crate) fn percentage(score: f64, max: f64) -> f64 {
    if max > 0.0 {
        score / max * 100.0
    } else {
        0.0
    }
}

/// Scores one answer. An option that is not one of the question's own counts as no answer.
pub(crate) fn score_question(entry: &QuestionWithOptions, selected: Option<i64>) -> ScoredAnswer {
    let chosen = selected.and_then(|id| entry.options.iter().find(|option| option.id == id));
    let is_correct = chosen.is_some_and(|option| option.is_correct);

    ScoredAnswer {
        question_id: entry.question.id,
        selected_option_id: chosen.map(|option| option.id),
        is_correct,
        points_earned: if is_correct { entry.question.points } else { 0.0 },
    }
}

/// Scores a submission against the exam's full question set.
///
/// Entries for unknown questions are dropped and only the first entry per question counts.
/// Unanswered questions earn nothing but still count toward `max_points`.
pub(crate) fn score_attempt(
    questions: &[QuestionWithOptions],
    submitted: &[SubmittedAnswer],
) -> AttemptScore {
    let mut seen = HashSet::new();
    let mut answers = Vec::with_capacity(submitted.len());

    for answer in submitted {
        let Some(entry) = questions.iter().find(|entry| entry.question.id == answer.question_id)
        else {
            tracing::debug!(question_id = answer.question_id, "ignoring answer to foreign question");
            continue;
        };
        if !seen.insert(answer.question_id) {
            continue;
        }
        answers.push(score_question(entry, answer.selected_option_id));
    }

    let total_score = answers.iter().map(|answer| answer.points_earned).sum();
    AttemptScore { answers, total_score, max_points: max_points(questions) }
}

/// Finalized result of one exam, the input of the course grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradedExam {
    pub(crate) exam_id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) weight_percentage: f64,
    pub(crate) percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct GradeBreakdown {
    pub(crate) midterm_score: f64,
    pub(crate) final_score: f64,
    pub(crate) midterm_weight: f64,
    pub(crate) final_weight: f64,
    pub(crate) final_grade: f64,
}

/// Weighted midterm/final combination. Later entries replace earlier ones of the same type.
pub(crate) fn combine_grades(graded: &[GradedExam]) -> Option<GradeBreakdown> {
    if graded.is_empty() {
        return None;
    }

    let mut midterm: Option<GradedExam> = None;
    let mut final_exam: Option<GradedExam> = None;
    for exam in graded {
        let bucket = match exam.exam_type {
            ExamType::Midterm => &mut midterm,
            ExamType::Final => &mut final_exam,
        };
        if let Some(previous) = bucket.replace(*exam) {
            tracing::warn!(
                exam_type = exam.exam_type.as_str(),
                replaced_exam_id = previous.exam_id,
                exam_id = exam.exam_id,
                "multiple graded exams of one type; keeping the later one"
            );
        }
    }

    let (midterm_score, midterm_weight) =
        midterm.map_or((0.0, 0.0), |exam| (exam.percentage, exam.weight_percentage));
    let (final_score, final_weight) =
        final_exam.map_or((0.0, 0.0), |exam| (exam.percentage, exam.weight_percentage));

    let total_weight = midterm_weight + final_weight;
    let final_grade = if total_weight > 0.0 {
        (midterm_score * midterm_weight + final_score * final_weight) / total_weight
    } else {
        let nonzero: Vec<f64> =
            [midterm_score, final_score].into_iter().filter(|value| *value > 0.0).collect();
        if nonzero.is_empty() {
            0.0
        } else {
            nonzero.iter().sum::<f64>() / nonzero.len() as f64
        }
    };

    Some(GradeBreakdown {
        midterm_score,
        final_score,
        midterm_weight,
        final_weight,
        final_grade: round2(final_grade),
    })
}

pub(crate) async fn course_grade(
    store: &dyn Store,
    student_id: i64,
    course_id: i64,
) -> CoreResult<Option<GradeBreakdown>> {
    let mut uow = store.begin().await?;
    course_grade_in(uow.as_mut(), student_id, course_id).await
}

/// Same as [`course_grade`] inside an already open unit of work.
pub(crate) async fn course_grade_in(
    uow: &mut dyn UnitOfWork,
    student_id: i64,
    course_id: i64,
) -> CoreResult<Option<GradeBreakdown>> {
    let exams = uow.list_exams_for_course(course_id).await?;
    let mut graded = Vec::new();

    for exam in exams {
        let Some(attempt) = uow.find_attempt(exam.id, student_id).await? else {
            continue;
        };
        if !attempt.is_finalized() {
            continue;
        }
        let questions = uow.list_questions(exam.id).await?;
        graded.push(GradedExam {
            exam_id: exam.id,
            exam_type: exam.exam_type,
            weight_percentage: exam.weight_percentage,
            percentage: percentage(attempt.total_score, max_points(&questions)),
        });
    }

    Ok(combine_grades(&graded))
}
