//! Attempt lifecycle: NoAttempt -> InProgress -> Submitted.
//!
//! Every operation runs in one unit of work. Expired in-progress attempts are finalized
//! lazily whenever a student read touches them, and in bulk by [`auto_submit_expired`].

use std::collections::HashMap;

use serde::Serialize;
use time::PrimitiveDateTime;

use crate::core::clock::Clock;
use crate::core::config::GuardPolicy;
use crate::core::metrics;
use crate::db::models::{Exam, ExamAttempt};
use crate::repositories::{CreateAnswer, CreateAttempt, Store, UnitOfWork};
use crate::services::errors::{CoreError, CoreResult};
use crate::services::grading::{self, SubmittedAnswer};
use crate::services::presentation::{self, CourseView, Disclosure, QuestionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeMode {
    ManualSubmit,
    AutoDeadline,
}

impl FinalizeMode {
    fn as_str(self) -> &'static str {
        match self {
            FinalizeMode::ManualSubmit => "manual_submit",
            FinalizeMode::AutoDeadline => "auto_deadline",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartedAttempt {
    pub(crate) exam: Exam,
    pub(crate) attempt: ExamAttempt,
    pub(crate) questions: Vec<QuestionView>,
    pub(crate) duration_minutes: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmittedAttempt {
    pub(crate) attempt: ExamAttempt,
    pub(crate) max_points: f64,
    pub(crate) percentage: f64,
    pub(crate) submitted_late: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamAvailability {
    #[serde(flatten)]
    pub(crate) exam: Exam,
    pub(crate) can_start: bool,
    pub(crate) already_taken: bool,
    pub(crate) in_progress: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub(crate) is_upcoming: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Serialize)]
pub(crate) struct ActiveExams {
    pub(crate) exams: Vec<ExamAvailability>,
    pub(crate) upcoming_exams: Vec<ExamAvailability>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamDetails {
    pub(crate) exam: Exam,
    pub(crate) attempt: ExamAttempt,
    pub(crate) questions: Vec<QuestionView>,
}

async fn load_exam(uow: &mut dyn UnitOfWork, exam_id: i64) -> CoreResult<Exam> {
    uow.find_exam(exam_id).await?.ok_or_else(|| CoreError::not_found("Exam not found"))
}

pub(crate) async fn start_attempt(
    store: &dyn Store,
    clock: &dyn Clock,
    policy: &GuardPolicy,
    exam_id: i64,
    student_id: i64,
) -> CoreResult<StartedAttempt> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let exam = load_exam(uow.as_mut(), exam_id).await?;

    if !exam.is_open_at(now) {
        return Err(CoreError::eligibility("Exam is not open at this time"));
    }
    if uow.find_attempt(exam.id, student_id).await?.is_some() {
        return Err(CoreError::eligibility("You have already started this exam"));
    }
    if uow.find_enrollment_for(student_id, exam.course_id).await?.is_none() {
        return Err(CoreError::eligibility("You are not enrolled in this course"));
    }

    let questions = uow.list_questions(exam.id).await?;
    let required = policy.min_exam_questions as usize;
    if questions.len() < required {
        return Err(CoreError::eligibility(format!(
            "Exam does not have enough questions (minimum {required} required)"
        )));
    }

    let attempt = uow
        .insert_attempt(CreateAttempt { exam_id: exam.id, student_id, start_time: now })
        .await?
        .ok_or_else(|| CoreError::eligibility("You have already started this exam"))?;
    uow.commit().await?;

    metrics::attempt_started();
    tracing::info!(exam_id = exam.id, student_id, attempt_id = attempt.id, "exam attempt started");

    Ok(StartedAttempt {
        questions: presentation::shuffled(questions, Disclosure::Hidden),
        duration_minutes: exam.duration_minutes,
        exam,
        attempt,
    })
}

pub(crate) async fn submit_attempt(
    store: &dyn Store,
    clock: &dyn Clock,
    exam_id: i64,
    student_id: i64,
    answers: &[SubmittedAnswer],
) -> CoreResult<SubmittedAttempt> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let exam = load_exam(uow.as_mut(), exam_id).await?;
    let attempt = uow
        .find_attempt(exam.id, student_id)
        .await?
        .ok_or_else(|| CoreError::not_found("You have not started this exam"))?;
    if attempt.is_finalized() {
        return Err(CoreError::DuplicateSubmission("This exam has already been submitted".into()));
    }

    let questions = uow.list_questions(exam.id).await?;
    let scored = grading::score_attempt(&questions, answers);

    uow.delete_answers(attempt.id).await?;
    for answer in &scored.answers {
        uow.insert_answer(CreateAnswer {
            attempt_id: attempt.id,
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
            is_correct: answer.is_correct,
            points_earned: answer.points_earned,
        })
        .await?;
    }

    if !uow.finalize_attempt(attempt.id, scored.total_score, now).await? {
        // Dropping the unit of work discards the answer replacement above.
        return Err(CoreError::DuplicateSubmission("This exam has already been submitted".into()));
    }
    let attempt = ExamAttempt {
        total_score: scored.total_score,
        submitted_at: Some(now),
        end_time: Some(now),
        ..attempt
    };
    uow.commit().await?;

    let submitted_late = now > exam.attempt_deadline(attempt.start_time);
    if submitted_late {
        tracing::warn!(
            exam_id = exam.id,
            student_id,
            attempt_id = attempt.id,
            deadline = %exam.attempt_deadline(attempt.start_time),
            "late submission accepted"
        );
    }
    metrics::attempt_submitted(submitted_late);
    tracing::info!(
        exam_id = exam.id,
        student_id,
        attempt_id = attempt.id,
        total_score = scored.total_score,
        mode = FinalizeMode::ManualSubmit.as_str(),
        "exam attempt finalized"
    );

    Ok(SubmittedAttempt {
        percentage: grading::round2(grading::percentage(scored.total_score, scored.max_points)),
        max_points: scored.max_points,
        submitted_late,
        attempt,
    })
}

/// Finalizes `attempt` from its stored answers when its deadline has passed.
///
/// Returns the attempt as it stands afterwards. Nothing is committed here.
pub(crate) async fn settle_if_expired(
    uow: &mut dyn UnitOfWork,
    exam: &Exam,
    attempt: ExamAttempt,
    now: PrimitiveDateTime,
) -> CoreResult<ExamAttempt> {
    if attempt.is_finalized() || now < exam.attempt_deadline(attempt.start_time) {
        return Ok(attempt);
    }

    // Rescored against current options; an edited question may have dropped the selection.
    let questions = uow.list_questions(exam.id).await?;
    let stored: Vec<SubmittedAnswer> = uow
        .list_answers(attempt.id)
        .await?
        .into_iter()
        .map(|answer| SubmittedAnswer {
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
        })
        .collect();
    let total_score = grading::score_attempt(&questions, &stored).total_score;

    if !uow.finalize_attempt(attempt.id, total_score, now).await? {
        return Ok(attempt);
    }
    metrics::attempts_auto_submitted(1);
    tracing::info!(
        exam_id = exam.id,
        student_id = attempt.student_id,
        attempt_id = attempt.id,
        total_score,
        mode = FinalizeMode::AutoDeadline.as_str(),
        "exam attempt finalized"
    );

    Ok(ExamAttempt { total_score, submitted_at: Some(now), end_time: Some(now), ..attempt })
}

/// Finalizes every open attempt whose duration budget or exam window has elapsed.
pub(crate) async fn auto_submit_expired(store: &dyn Store, clock: &dyn Clock) -> CoreResult<u64> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let open = uow.list_open_attempts().await?;

    let mut exams: HashMap<i64, Exam> = HashMap::new();
    let mut finalized = 0u64;
    for attempt in open {
        let exam = match exams.get(&attempt.exam_id) {
            Some(exam) => exam.clone(),
            None => {
                let Some(exam) = uow.find_exam(attempt.exam_id).await? else {
                    continue;
                };
                exams.insert(exam.id, exam.clone());
                exam
            }
        };
        if settle_if_expired(uow.as_mut(), &exam, attempt, now).await?.is_finalized() {
            finalized += 1;
        }
    }
    uow.commit().await?;

    if finalized > 0 {
        tracing::info!(count = finalized, "auto-submitted expired attempts");
    }
    Ok(finalized)
}

pub(crate) async fn enrolled_courses(store: &dyn Store, student_id: i64) -> CoreResult<Vec<CourseView>> {
    let mut uow = store.begin().await?;
    let mut courses = Vec::new();
    for enrollment in uow.list_enrollments_for_student(student_id).await? {
        if let Some(course) = uow.find_course(enrollment.course_id).await? {
            courses.push(course);
        }
    }
    presentation::course_views(uow.as_mut(), courses).await
}

/// Exams of the student's courses that are open now, plus those still to come.
pub(crate) async fn active_exams(
    store: &dyn Store,
    clock: &dyn Clock,
    student_id: i64,
) -> CoreResult<ActiveExams> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let enrollments = uow.list_enrollments_for_student(student_id).await?;

    let mut exams = Vec::new();
    let mut upcoming_exams = Vec::new();
    for enrollment in enrollments {
        for exam in uow.list_exams_for_course(enrollment.course_id).await? {
            if exam.is_open_at(now) {
                let attempt = match uow.find_attempt(exam.id, student_id).await? {
                    Some(attempt) => Some(settle_if_expired(uow.as_mut(), &exam, attempt, now).await?),
                    None => None,
                };
                exams.push(ExamAvailability {
                    can_start: attempt.is_none(),
                    already_taken: attempt.as_ref().is_some_and(ExamAttempt::is_finalized),
                    in_progress: attempt.as_ref().is_some_and(|attempt| !attempt.is_finalized()),
                    is_upcoming: false,
                    exam,
                });
            } else if exam.start_time > now {
                upcoming_exams.push(ExamAvailability {
                    exam,
                    can_start: false,
                    already_taken: false,
                    in_progress: false,
                    is_upcoming: true,
                });
            }
        }
    }
    uow.commit().await?;

    upcoming_exams
        .sort_by(|a, b| a.exam.start_time.cmp(&b.exam.start_time).then(a.exam.id.cmp(&b.exam.id)));
    Ok(ActiveExams { exams, upcoming_exams })
}

/// The started exam with a fresh shuffle and the student's stored selections.
pub(crate) async fn exam_details(
    store: &dyn Store,
    clock: &dyn Clock,
    exam_id: i64,
    student_id: i64,
) -> CoreResult<ExamDetails> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let exam = load_exam(uow.as_mut(), exam_id).await?;
    if uow.find_enrollment_for(student_id, exam.course_id).await?.is_none() {
        return Err(CoreError::forbidden("You are not enrolled in this course"));
    }
    let attempt = uow
        .find_attempt(exam.id, student_id)
        .await?
        .ok_or_else(|| CoreError::eligibility("You have not started this exam"))?;
    let attempt = settle_if_expired(uow.as_mut(), &exam, attempt, now).await?;

    let stored = uow.list_answers(attempt.id).await?;
    let mut questions =
        presentation::shuffled(uow.list_questions(exam.id).await?, Disclosure::Hidden);
    for question in &mut questions {
        if let Some(answer) = stored.iter().find(|answer| answer.question_id == question.id) {
            question.selected_option_id = Some(answer.selected_option_id);
        }
    }
    uow.commit().await?;

    Ok(ExamDetails { exam, attempt, questions })
}
