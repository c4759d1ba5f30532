//! Exam and question maintenance by the owning instructor.

use crate::core::clock::{self, Clock};
use crate::core::config::GuardPolicy;
use crate::db::models::{Course, Exam, QuestionWithOptions};
use crate::db::types::{ExamType, QuestionType};
use crate::repositories::{CreateExam, CreateOption, CreateQuestion, Store, UnitOfWork};
use crate::schemas::course::CourseRoster;
use crate::schemas::exam::{
    ExamCreate, ExamCreated, ExamQuestions, ExamUpdate, ExamUpdated, OptionCreate, QuestionAdded,
    QuestionCreate, QuestionUpdate,
};
use crate::services::errors::{CoreError, CoreResult};
use crate::services::presentation::{self, CourseView, Disclosure, QuestionView};

async fn owned_course(
    uow: &mut dyn UnitOfWork,
    course_id: i64,
    instructor_id: i64,
) -> CoreResult<Course> {
    let course =
        uow.find_course(course_id).await?.ok_or_else(|| CoreError::not_found("Course not found"))?;
    if course.instructor_id != instructor_id {
        return Err(CoreError::forbidden("You do not teach this course"));
    }
    Ok(course)
}

async fn owned_exam(uow: &mut dyn UnitOfWork, exam_id: i64, instructor_id: i64) -> CoreResult<Exam> {
    let exam =
        uow.find_exam(exam_id).await?.ok_or_else(|| CoreError::not_found("Exam not found"))?;
    if exam.instructor_id != instructor_id {
        return Err(CoreError::forbidden("You do not own this exam"));
    }
    Ok(exam)
}

async fn owned_question(
    uow: &mut dyn UnitOfWork,
    question_id: i64,
    instructor_id: i64,
) -> CoreResult<(Exam, QuestionWithOptions)> {
    let entry = uow
        .find_question(question_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Question not found"))?;
    let exam = owned_exam(uow, entry.question.exam_id, instructor_id).await?;
    Ok((exam, entry))
}

fn check_weight(weight: f64) -> CoreResult<()> {
    if (0.0..=100.0).contains(&weight) {
        Ok(())
    } else {
        Err(CoreError::validation("weight_percentage must be between 0 and 100"))
    }
}

fn check_duration(minutes: i32) -> CoreResult<()> {
    if minutes > 0 {
        Ok(())
    } else {
        Err(CoreError::validation("duration_minutes must be positive"))
    }
}

/// Parses a window and checks it starts in the future and ends after it starts.
fn parse_window(
    start: &str,
    end: &str,
    now: time::PrimitiveDateTime,
) -> CoreResult<(time::PrimitiveDateTime, time::PrimitiveDateTime)> {
    let start_time = clock::parse_civil(start)?;
    let end_time = clock::parse_civil(end)?;
    if start_time < now {
        return Err(CoreError::validation(format!(
            "Exam start time cannot be in the past (server time is {})",
            clock::format_civil(now)
        )));
    }
    if start_time >= end_time {
        return Err(CoreError::validation("Exam end time must be after its start time"));
    }
    Ok((start_time, end_time))
}

fn check_options(options: &[OptionCreate]) -> CoreResult<()> {
    if options.len() < 2 {
        return Err(CoreError::validation("At least 2 answer options are required"));
    }
    if !options.iter().any(|option| option.is_correct) {
        return Err(CoreError::validation("At least one answer option must be correct"));
    }
    if options.iter().any(|option| option.option_text.trim().is_empty()) {
        return Err(CoreError::validation("Answer option text must not be empty"));
    }
    Ok(())
}

async fn insert_options(
    uow: &mut dyn UnitOfWork,
    question_id: i64,
    options: &[OptionCreate],
) -> CoreResult<()> {
    for option in options {
        uow.insert_option(CreateOption {
            question_id,
            option_text: option.option_text.clone(),
            is_correct: option.is_correct,
        })
        .await?;
    }
    Ok(())
}

async fn revealed_question(uow: &mut dyn UnitOfWork, question_id: i64) -> CoreResult<QuestionView> {
    let entry = uow
        .find_question(question_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Question not found"))?;
    presentation::in_stored_order(vec![entry], Disclosure::Revealed)
        .pop()
        .ok_or_else(|| CoreError::not_found("Question not found"))
}

pub(crate) async fn create_exam(
    store: &dyn Store,
    clock: &dyn Clock,
    instructor_id: i64,
    payload: &ExamCreate,
) -> CoreResult<ExamCreated> {
    check_weight(payload.weight_percentage)?;
    check_duration(payload.duration_minutes)?;
    let now = clock.now_utc();

    let mut uow = store.begin().await?;
    let course = owned_course(uow.as_mut(), payload.course_id, instructor_id).await?;
    let (start_time, end_time) = parse_window(&payload.start_time, &payload.end_time, now)?;

    let exam = uow
        .insert_exam(CreateExam {
            course_id: course.id,
            instructor_id,
            exam_type: payload.exam_type,
            start_time,
            end_time,
            duration_minutes: payload.duration_minutes,
            weight_percentage: payload.weight_percentage,
            created_at: now,
        })
        .await?;
    let course_exams = uow.list_exams_for_course(course.id).await?;
    uow.commit().await?;

    let count = |kind: ExamType| course_exams.iter().filter(|exam| exam.exam_type == kind).count();
    let midterm_count = count(ExamType::Midterm);
    let final_count = count(ExamType::Final);

    let mut warnings = Vec::new();
    if midterm_count == 0 {
        warnings.push("Every course needs at least one midterm exam".to_string());
    }
    if final_count == 0 {
        warnings.push("Every course needs at least one final exam".to_string());
    }
    if count(exam.exam_type) > 1 {
        warnings.push(format!(
            "Course already has a {} exam; only the latest one counts toward the grade",
            exam.exam_type.as_str()
        ));
    }
    for warning in &warnings {
        tracing::warn!(course_id = course.id, exam_id = exam.id, %warning, "exam created with warning");
    }
    tracing::info!(course_id = course.id, exam_id = exam.id, instructor_id, "exam created");

    Ok(ExamCreated { exam, midterm_count, final_count, warnings })
}

pub(crate) async fn update_exam(
    store: &dyn Store,
    clock: &dyn Clock,
    instructor_id: i64,
    exam_id: i64,
    payload: &ExamUpdate,
) -> CoreResult<ExamUpdated> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let mut exam = owned_exam(uow.as_mut(), exam_id, instructor_id).await?;
    let mut updated = Vec::new();

    if let Some(weight) = payload.weight_percentage {
        check_weight(weight)?;
        exam.weight_percentage = weight;
        updated.push("weight");
    }
    match (payload.start_time.as_deref(), payload.end_time.as_deref()) {
        (Some(start), Some(end)) => {
            let (start_time, end_time) = parse_window(start, end, now)?;
            exam.start_time = start_time;
            exam.end_time = end_time;
            updated.push("schedule");
        }
        (None, None) => {}
        _ => {
            return Err(CoreError::validation("start_time and end_time must be given together"));
        }
    }
    if let Some(minutes) = payload.duration_minutes {
        check_duration(minutes)?;
        exam.duration_minutes = minutes;
        updated.push("duration");
    }
    if updated.is_empty() {
        return Err(CoreError::validation("No fields to update"));
    }

    uow.update_exam(&exam).await?;
    uow.commit().await?;
    tracing::info!(exam_id = exam.id, fields = ?updated, "exam updated");

    Ok(ExamUpdated { message: format!("Exam {} updated", updated.join(", ")), exam })
}

pub(crate) async fn list_own_exams(store: &dyn Store, instructor_id: i64) -> CoreResult<Vec<Exam>> {
    let mut uow = store.begin().await?;
    Ok(uow.list_exams_by_instructor(instructor_id).await?)
}

pub(crate) async fn list_own_courses(
    store: &dyn Store,
    instructor_id: i64,
) -> CoreResult<Vec<CourseView>> {
    let mut uow = store.begin().await?;
    let courses = uow.list_courses_by_instructor(instructor_id).await?;
    presentation::course_views(uow.as_mut(), courses).await
}

pub(crate) async fn ensure_course_owner(
    store: &dyn Store,
    instructor_id: i64,
    course_id: i64,
) -> CoreResult<()> {
    let mut uow = store.begin().await?;
    owned_course(uow.as_mut(), course_id, instructor_id).await?;
    Ok(())
}

pub(crate) async fn course_students(
    store: &dyn Store,
    instructor_id: i64,
    course_id: i64,
) -> CoreResult<CourseRoster> {
    let mut uow = store.begin().await?;
    let course = owned_course(uow.as_mut(), course_id, instructor_id).await?;

    let mut students = Vec::new();
    for enrollment in uow.list_enrollments_for_course(course.id).await? {
        if let Some(student) = uow.find_user(enrollment.student_id).await? {
            students.push(student);
        }
    }
    Ok(CourseRoster { course: presentation::course_view(uow.as_mut(), course).await?, students })
}

/// Adds a question and its options in one step.
pub(crate) async fn add_question(
    store: &dyn Store,
    policy: &GuardPolicy,
    instructor_id: i64,
    exam_id: i64,
    payload: &QuestionCreate,
) -> CoreResult<QuestionAdded> {
    if payload.question_text.trim().is_empty() {
        return Err(CoreError::validation("Question text is required"));
    }
    if payload.points <= 0.0 {
        return Err(CoreError::validation("points must be positive"));
    }
    check_options(&payload.answer_options)?;

    let mut uow = store.begin().await?;
    let exam = owned_exam(uow.as_mut(), exam_id, instructor_id).await?;
    let question = uow
        .insert_question(CreateQuestion {
            exam_id: exam.id,
            question_text: payload.question_text.clone(),
            question_type: QuestionType::MultipleChoice,
            points: payload.points,
        })
        .await?;
    insert_options(uow.as_mut(), question.id, &payload.answer_options).await?;

    let total_questions = uow.count_questions(exam.id).await?;
    let view = revealed_question(uow.as_mut(), question.id).await?;
    uow.commit().await?;

    let minimum = i64::from(policy.min_exam_questions);
    let warning = (total_questions < minimum)
        .then(|| format!("An exam needs at least {minimum} questions (currently {total_questions})"));
    tracing::info!(exam_id = exam.id, question_id = question.id, total_questions, "question added");

    Ok(QuestionAdded { question: view, total_questions, warning })
}

/// Updates text and points; a given option list replaces the stored one entirely.
pub(crate) async fn update_question(
    store: &dyn Store,
    instructor_id: i64,
    question_id: i64,
    payload: &QuestionUpdate,
) -> CoreResult<QuestionView> {
    let mut uow = store.begin().await?;
    let (_, entry) = owned_question(uow.as_mut(), question_id, instructor_id).await?;
    let mut question = entry.question;

    if let Some(text) = payload.question_text.as_deref() {
        if text.trim().is_empty() {
            return Err(CoreError::validation("Question text must not be empty"));
        }
        question.question_text = text.to_string();
    }
    if let Some(points) = payload.points {
        if points <= 0.0 {
            return Err(CoreError::validation("points must be positive"));
        }
        question.points = points;
    }
    uow.update_question(&question).await?;

    if let Some(options) = payload.answer_options.as_deref() {
        check_options(options)?;
        uow.delete_options(question.id).await?;
        insert_options(uow.as_mut(), question.id, options).await?;
    }

    let view = revealed_question(uow.as_mut(), question.id).await?;
    uow.commit().await?;
    tracing::info!(question_id = question.id, exam_id = question.exam_id, "question updated");
    Ok(view)
}

/// Deletes a question unless the exam would drop to or below its question floor.
pub(crate) async fn delete_question(
    store: &dyn Store,
    policy: &GuardPolicy,
    instructor_id: i64,
    question_id: i64,
) -> CoreResult<i64> {
    let mut uow = store.begin().await?;
    let (exam, entry) = owned_question(uow.as_mut(), question_id, instructor_id).await?;

    let total = uow.count_questions(exam.id).await?;
    let minimum = i64::from(policy.min_exam_questions);
    if total <= minimum {
        return Err(CoreError::guard(
            "min_exam_questions",
            format!("An exam needs at least {minimum} questions (currently {total}); question not deleted"),
        ));
    }

    uow.delete_question(entry.question.id).await?;
    uow.commit().await?;
    tracing::info!(question_id, exam_id = exam.id, remaining = total - 1, "question deleted");
    Ok(total - 1)
}

/// Stored-order questions with correct answers, for the owning instructor.
pub(crate) async fn exam_questions(
    store: &dyn Store,
    instructor_id: i64,
    exam_id: i64,
) -> CoreResult<ExamQuestions> {
    let mut uow = store.begin().await?;
    let exam = owned_exam(uow.as_mut(), exam_id, instructor_id).await?;
    let questions =
        presentation::in_stored_order(uow.list_questions(exam.id).await?, Disclosure::Revealed);
    Ok(ExamQuestions { exam, questions })
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::core::clock::format_civil;
    use crate::db::types::UserRole;
    use crate::test_support::seed::{self, ExamScenario};

    fn option(text: &str, is_correct: bool) -> OptionCreate {
        OptionCreate { option_text: text.to_string(), is_correct }
    }

    fn exam_payload(scenario: &ExamScenario, offset_days: i64) -> ExamCreate {
        let start = scenario.clock.now_utc() + Duration::days(offset_days);
        ExamCreate {
            course_id: scenario.course.id,
            exam_type: ExamType::Final,
            start_time: format_civil(start),
            end_time: format_civil(start + Duration::hours(2)),
            duration_minutes: 45,
            weight_percentage: 60.0,
        }
    }

    #[tokio::test]
    async fn create_exam_parses_civil_time_and_counts_types() {
        let scenario = ExamScenario::open_now().await;
        let payload = exam_payload(&scenario, 3);

        let created = create_exam(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.instructor.id,
            &payload,
        )
        .await
        .unwrap();

        assert_eq!(created.exam.start_time, scenario.clock.now_utc() + Duration::days(3));
        assert_eq!(created.midterm_count, 1);
        assert_eq!(created.final_count, 1);
        assert!(created.warnings.is_empty());

        let again = create_exam(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.instructor.id,
            &exam_payload(&scenario, 5),
        )
        .await
        .unwrap();
        assert_eq!(again.final_count, 2);
        assert_eq!(again.warnings.len(), 1);
    }

    #[tokio::test]
    async fn create_exam_rejects_bad_windows_and_foreign_courses() {
        let scenario = ExamScenario::open_now().await;

        let past = exam_payload(&scenario, -1);
        let err = create_exam(scenario.store.as_ref(), scenario.clock.as_ref(), scenario.instructor.id, &past)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(err.to_string().ends_with("(server time is 2025-03-10T12:00:00)"));

        let mut inverted = exam_payload(&scenario, 2);
        std::mem::swap(&mut inverted.start_time, &mut inverted.end_time);
        let err =
            create_exam(scenario.store.as_ref(), scenario.clock.as_ref(), scenario.instructor.id, &inverted)
                .await
                .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let mut garbage = exam_payload(&scenario, 2);
        garbage.start_time = "next tuesday".to_string();
        let err =
            create_exam(scenario.store.as_ref(), scenario.clock.as_ref(), scenario.instructor.id, &garbage)
                .await
                .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let other = seed::user(scenario.store.as_ref(), "other@uni.test", UserRole::Instructor).await;
        let err = create_exam(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            other.id,
            &exam_payload(&scenario, 2),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "authorization_error");
    }

    #[tokio::test]
    async fn update_exam_requires_a_field_and_full_window() {
        let scenario = ExamScenario::open_now().await;
        let err = update_exam(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.instructor.id,
            scenario.exam.id,
            &ExamUpdate::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let half = ExamUpdate { start_time: Some("2030-01-01T10:00".into()), ..ExamUpdate::default() };
        let err = update_exam(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.instructor.id,
            scenario.exam.id,
            &half,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let weight = ExamUpdate { weight_percentage: Some(35.0), duration_minutes: Some(20), ..ExamUpdate::default() };
        let updated = update_exam(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.instructor.id,
            scenario.exam.id,
            &weight,
        )
        .await
        .unwrap();
        assert_eq!(updated.exam.weight_percentage, 35.0);
        assert_eq!(updated.exam.duration_minutes, 20);
    }

    #[tokio::test]
    async fn question_rules_and_floor() {
        let scenario = ExamScenario::open_now().await;
        let policy = GuardPolicy::default();

        let lonely = QuestionCreate {
            question_text: "2 + 2?".into(),
            points: 2.0,
            answer_options: vec![option("4", true)],
        };
        let err = add_question(scenario.store.as_ref(), &policy, scenario.instructor.id, scenario.exam.id, &lonely)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let none_correct = QuestionCreate {
            answer_options: vec![option("3", false), option("5", false)],
            ..lonely
        };
        let err =
            add_question(scenario.store.as_ref(), &policy, scenario.instructor.id, scenario.exam.id, &none_correct)
                .await
                .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let first = scenario.questions[0].question.id;
        let err = delete_question(scenario.store.as_ref(), &policy, scenario.instructor.id, first)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "integrity_guard");

        let good = QuestionCreate {
            question_text: "2 + 2?".into(),
            points: 2.0,
            answer_options: vec![option("4", true), option("5", false)],
        };
        let added = add_question(scenario.store.as_ref(), &policy, scenario.instructor.id, scenario.exam.id, &good)
            .await
            .unwrap();
        assert_eq!(added.total_questions, 6);
        assert!(added.warning.is_none());
        assert_eq!(added.question.options.len(), 2);
        assert_eq!(added.question.options[0].is_correct, Some(true));

        let remaining = delete_question(scenario.store.as_ref(), &policy, scenario.instructor.id, first)
            .await
            .unwrap();
        assert_eq!(remaining, 5);
    }

    #[tokio::test]
    async fn update_question_replaces_options() {
        let scenario = ExamScenario::open_now().await;
        let target = scenario.questions[1].question.id;

        let update = QuestionUpdate {
            question_text: Some("Rewritten".into()),
            points: Some(3.0),
            answer_options: Some(vec![option("a", false), option("b", false), option("c", true)]),
        };
        let view = update_question(scenario.store.as_ref(), scenario.instructor.id, target, &update)
            .await
            .unwrap();
        assert_eq!(view.question_text, "Rewritten");
        assert_eq!(view.points, 3.0);
        assert_eq!(view.options.len(), 3);
        assert_eq!(view.options.iter().filter(|o| o.is_correct == Some(true)).count(), 1);

        let listing = exam_questions(scenario.store.as_ref(), scenario.instructor.id, scenario.exam.id)
            .await
            .unwrap();
        assert_eq!(listing.questions.len(), 5);
        assert_eq!(listing.questions[1].id, target);
    }

    #[tokio::test]
    async fn roster_requires_course_ownership() {
        let scenario = ExamScenario::open_now().await;
        let roster = course_students(scenario.store.as_ref(), scenario.instructor.id, scenario.course.id)
            .await
            .unwrap();
        assert_eq!(roster.students.len(), 1);
        assert_eq!(roster.course.instructor.as_ref().map(|u| u.id), Some(scenario.instructor.id));

        let err = course_students(scenario.store.as_ref(), scenario.student.id, scenario.course.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "authorization_error");
    }
}
