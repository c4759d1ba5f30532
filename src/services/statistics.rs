//! Read-only rollups over finalized attempts. Every average is rounded to two decimals.

use serde::Serialize;
use time::PrimitiveDateTime;

use crate::core::clock::Clock;
use crate::db::models::{Exam, User};
use crate::db::types::{ExamType, UserRole};
use crate::repositories::{Store, UnitOfWork};
use crate::services::attempts;
use crate::services::errors::{CoreError, CoreResult};
use crate::services::grading::{self, round2, GradeBreakdown};
use crate::services::presentation::{self, CourseView};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExamStatistics {
    pub(crate) exam_id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) attempt_count: usize,
    pub(crate) average_score: f64,
    pub(crate) max_score: f64,
    pub(crate) average_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CourseStatistics {
    pub(crate) student_count: usize,
    pub(crate) exam_count: usize,
    pub(crate) exams: Vec<ExamStatistics>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct ClassStatistics {
    pub(crate) total_students: i64,
    pub(crate) total_instructors: i64,
    pub(crate) total_courses: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseGrade {
    pub(crate) course: CourseView,
    pub(crate) grade: GradeBreakdown,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentOverview {
    pub(crate) student: User,
    pub(crate) courses: Vec<CourseGrade>,
    pub(crate) overall_average: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseStatisticsEntry {
    pub(crate) course: CourseView,
    pub(crate) statistics: CourseStatistics,
}

#[derive(Debug, Serialize)]
pub(crate) struct DepartmentOverview {
    pub(crate) general_statistics: ClassStatistics,
    pub(crate) course_statistics: Vec<CourseStatisticsEntry>,
    pub(crate) student_grades: Vec<StudentOverview>,
    pub(crate) overall_class_average: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentGrade {
    pub(crate) student: User,
    pub(crate) grade: Option<GradeBreakdown>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseDetail {
    pub(crate) course: CourseView,
    pub(crate) statistics: CourseStatistics,
    pub(crate) student_details: Vec<StudentGrade>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct ExamResultStatistics {
    pub(crate) total_attempts: usize,
    pub(crate) average_score: f64,
    pub(crate) average_percentage: f64,
    pub(crate) max_score: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResult {
    pub(crate) student: Option<User>,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    #[serde(serialize_with = "crate::core::clock::utc_serde::serialize_option")]
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResults {
    pub(crate) exam: Exam,
    pub(crate) statistics: ExamResultStatistics,
    pub(crate) student_results: Vec<StudentResult>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct OwnResult {
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct ParticipationStatistics {
    pub(crate) average_score: f64,
    pub(crate) average_percentage: f64,
    pub(crate) total_participants: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentExamResult {
    pub(crate) exam: Exam,
    pub(crate) my_result: OwnResult,
    pub(crate) statistics: ParticipationStatistics,
}

/// Finalized scores of one exam together with its point total.
struct ExamScores {
    scores: Vec<f64>,
    max_points: f64,
}

impl ExamScores {
    async fn load(uow: &mut dyn UnitOfWork, exam_id: i64) -> CoreResult<Self> {
        let questions = uow.list_questions(exam_id).await?;
        let scores = uow
            .list_attempts_for_exam(exam_id)
            .await?
            .into_iter()
            .filter(|attempt| attempt.is_finalized())
            .map(|attempt| attempt.total_score)
            .collect();
        Ok(Self { scores, max_points: grading::max_points(&questions) })
    }

    fn average_score(&self) -> f64 {
        mean(&self.scores).unwrap_or(0.0)
    }

    fn average_percentage(&self) -> f64 {
        grading::percentage(self.average_score(), self.max_points)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

async fn exam_statistics_in(uow: &mut dyn UnitOfWork, exam: &Exam) -> CoreResult<ExamStatistics> {
    let scores = ExamScores::load(uow, exam.id).await?;
    Ok(ExamStatistics {
        exam_id: exam.id,
        exam_type: exam.exam_type,
        attempt_count: scores.scores.len(),
        average_score: round2(scores.average_score()),
        max_score: scores.max_points,
        average_percentage: round2(scores.average_percentage()),
    })
}

async fn course_statistics_in(
    uow: &mut dyn UnitOfWork,
    course_id: i64,
) -> CoreResult<CourseStatistics> {
    let student_count = uow.list_enrollments_for_course(course_id).await?.len();
    let exams = uow.list_exams_for_course(course_id).await?;

    let mut per_exam = Vec::with_capacity(exams.len());
    for exam in &exams {
        per_exam.push(exam_statistics_in(uow, exam).await?);
    }
    Ok(CourseStatistics { student_count, exam_count: exams.len(), exams: per_exam })
}

pub(crate) async fn course_statistics(
    store: &dyn Store,
    course_id: i64,
) -> CoreResult<CourseStatistics> {
    let mut uow = store.begin().await?;
    if uow.find_course(course_id).await?.is_none() {
        return Err(CoreError::not_found("Course not found"));
    }
    course_statistics_in(uow.as_mut(), course_id).await
}

async fn class_statistics_in(uow: &mut dyn UnitOfWork) -> CoreResult<ClassStatistics> {
    Ok(ClassStatistics {
        total_students: uow.count_users(UserRole::Student).await?,
        total_instructors: uow.count_users(UserRole::Instructor).await?,
        total_courses: uow.list_courses().await?.len(),
    })
}

pub(crate) async fn class_statistics(store: &dyn Store) -> CoreResult<ClassStatistics> {
    let mut uow = store.begin().await?;
    class_statistics_in(uow.as_mut()).await
}

async fn student_overview_in(
    uow: &mut dyn UnitOfWork,
    student: User,
) -> CoreResult<StudentOverview> {
    let enrollments = uow.list_enrollments_for_student(student.id).await?;

    let mut courses = Vec::new();
    for enrollment in enrollments {
        let Some(grade) = grading::course_grade_in(uow, student.id, enrollment.course_id).await?
        else {
            continue;
        };
        let Some(course) = uow.find_course(enrollment.course_id).await? else {
            continue;
        };
        courses.push(CourseGrade { course: presentation::course_view(uow, course).await?, grade });
    }

    let grades: Vec<f64> = courses.iter().map(|entry| entry.grade.final_grade).collect();
    Ok(StudentOverview { student, courses, overall_average: mean(&grades).map(round2) })
}

/// Course grades of one student and the average of their final grades.
pub(crate) async fn student_overview(
    store: &dyn Store,
    student_id: i64,
) -> CoreResult<StudentOverview> {
    let mut uow = store.begin().await?;
    let student = uow
        .find_user(student_id)
        .await?
        .filter(|user| user.role == UserRole::Student)
        .ok_or_else(|| CoreError::not_found("Student not found"))?;
    student_overview_in(uow.as_mut(), student).await
}

pub(crate) async fn department_overview(store: &dyn Store) -> CoreResult<DepartmentOverview> {
    let mut uow = store.begin().await?;
    let general_statistics = class_statistics_in(uow.as_mut()).await?;

    let mut course_statistics = Vec::new();
    for course in uow.list_courses().await? {
        let statistics = course_statistics_in(uow.as_mut(), course.id).await?;
        let course = presentation::course_view(uow.as_mut(), course).await?;
        course_statistics.push(CourseStatisticsEntry { course, statistics });
    }

    let mut student_grades = Vec::new();
    for student in uow.list_users(Some(UserRole::Student)).await? {
        let overview = student_overview_in(uow.as_mut(), student).await?;
        if overview.overall_average.is_some() {
            student_grades.push(overview);
        }
    }

    let averages: Vec<f64> =
        student_grades.iter().filter_map(|overview| overview.overall_average).collect();
    let overall_class_average = round2(mean(&averages).unwrap_or(0.0));

    Ok(DepartmentOverview {
        general_statistics,
        course_statistics,
        student_grades,
        overall_class_average,
    })
}

pub(crate) async fn course_detail(store: &dyn Store, course_id: i64) -> CoreResult<CourseDetail> {
    let mut uow = store.begin().await?;
    let course = uow
        .find_course(course_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Course not found"))?;
    let statistics = course_statistics_in(uow.as_mut(), course.id).await?;

    let mut student_details = Vec::new();
    for enrollment in uow.list_enrollments_for_course(course.id).await? {
        let Some(student) = uow.find_user(enrollment.student_id).await? else {
            continue;
        };
        let grade = grading::course_grade_in(uow.as_mut(), student.id, course.id).await?;
        student_details.push(StudentGrade { student, grade });
    }

    Ok(CourseDetail {
        course: presentation::course_view(uow.as_mut(), course).await?,
        statistics,
        student_details,
    })
}

/// Results of an exam for the instructor who owns it.
pub(crate) async fn exam_results(
    store: &dyn Store,
    exam_id: i64,
    instructor_id: i64,
) -> CoreResult<ExamResults> {
    let mut uow = store.begin().await?;
    let exam =
        uow.find_exam(exam_id).await?.ok_or_else(|| CoreError::not_found("Exam not found"))?;
    if exam.instructor_id != instructor_id {
        return Err(CoreError::forbidden("You do not own this exam"));
    }

    let max_score = grading::max_points(&uow.list_questions(exam.id).await?);
    let attempts: Vec<_> = uow
        .list_attempts_for_exam(exam.id)
        .await?
        .into_iter()
        .filter(|attempt| attempt.is_finalized())
        .collect();

    let mut student_results = Vec::with_capacity(attempts.len());
    for attempt in &attempts {
        student_results.push(StudentResult {
            student: uow.find_user(attempt.student_id).await?,
            score: attempt.total_score,
            max_score,
            percentage: round2(grading::percentage(attempt.total_score, max_score)),
            submitted_at: attempt.submitted_at,
        });
    }

    let scores: Vec<f64> = attempts.iter().map(|attempt| attempt.total_score).collect();
    let average_score = mean(&scores).unwrap_or(0.0);
    Ok(ExamResults {
        statistics: ExamResultStatistics {
            total_attempts: attempts.len(),
            average_score: round2(average_score),
            average_percentage: round2(grading::percentage(average_score, max_score)),
            max_score,
        },
        exam,
        student_results,
    })
}

/// A student's own result next to the exam's participation figures.
pub(crate) async fn student_exam_result(
    store: &dyn Store,
    clock: &dyn Clock,
    exam_id: i64,
    student_id: i64,
) -> CoreResult<StudentExamResult> {
    let now = clock.now_utc();
    let mut uow = store.begin().await?;
    let exam =
        uow.find_exam(exam_id).await?.ok_or_else(|| CoreError::not_found("Exam not found"))?;
    let attempt = match uow.find_attempt(exam.id, student_id).await? {
        Some(attempt) => attempts::settle_if_expired(uow.as_mut(), &exam, attempt, now).await?,
        None => return Err(CoreError::not_found("Exam result not found")),
    };
    if !attempt.is_finalized() {
        return Err(CoreError::not_found("Exam result not found"));
    }

    let scores = ExamScores::load(uow.as_mut(), exam.id).await?;
    uow.commit().await?;

    Ok(StudentExamResult {
        my_result: OwnResult {
            score: attempt.total_score,
            max_score: scores.max_points,
            percentage: round2(grading::percentage(attempt.total_score, scores.max_points)),
        },
        statistics: ParticipationStatistics {
            average_score: round2(scores.average_score()),
            average_percentage: round2(scores.average_percentage()),
            total_participants: scores.scores.len(),
        },
        exam,
    })
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::test_support::seed::{self, ExamScenario};

    #[tokio::test]
    async fn course_statistics_average_finalized_attempts_only() {
        let scenario = ExamScenario::open_now().await;
        let second = seed::enrolled_student(&scenario, "second@uni.test").await;
        let third = seed::enrolled_student(&scenario, "third@uni.test").await;
        seed::finalized_attempt(&scenario, scenario.exam.id, scenario.student.id, 4.0).await;
        seed::finalized_attempt(&scenario, scenario.exam.id, second.id, 3.0).await;
        scenario.start_for(third.id).await;

        let stats = course_statistics(scenario.store.as_ref(), scenario.course.id).await.unwrap();
        assert_eq!(stats.student_count, 3);
        assert_eq!(stats.exam_count, 1);
        let exam = &stats.exams[0];
        assert_eq!(exam.attempt_count, 2);
        assert_eq!(exam.average_score, 3.5);
        assert_eq!(exam.max_score, 5.0);
        assert_eq!(exam.average_percentage, 70.0);

        let err = course_statistics(scenario.store.as_ref(), 9_999).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn exam_results_require_ownership() {
        let scenario = ExamScenario::open_now().await;
        seed::finalized_attempt(&scenario, scenario.exam.id, scenario.student.id, 2.0).await;

        let results =
            exam_results(scenario.store.as_ref(), scenario.exam.id, scenario.instructor.id)
                .await
                .unwrap();
        assert_eq!(results.statistics.total_attempts, 1);
        assert_eq!(results.student_results[0].percentage, 40.0);
        assert_eq!(
            results.student_results[0].student.as_ref().map(|user| user.id),
            Some(scenario.student.id)
        );

        let other = seed::user(scenario.store.as_ref(), "other@uni.test", UserRole::Instructor).await;
        let err = exam_results(scenario.store.as_ref(), scenario.exam.id, other.id).await.unwrap_err();
        assert_eq!(err.code(), "authorization_error");
    }

    #[tokio::test]
    async fn department_overview_averages_student_averages() {
        let scenario = ExamScenario::open_now().await;
        let second = seed::enrolled_student(&scenario, "second@uni.test").await;
        let idle = seed::enrolled_student(&scenario, "idle@uni.test").await;
        seed::finalized_attempt(&scenario, scenario.exam.id, scenario.student.id, 5.0).await;
        seed::finalized_attempt(&scenario, scenario.exam.id, second.id, 2.0).await;

        let overview = department_overview(scenario.store.as_ref()).await.unwrap();
        assert_eq!(overview.general_statistics.total_students, 3);
        assert_eq!(overview.general_statistics.total_instructors, 1);
        assert_eq!(overview.general_statistics.total_courses, 1);
        assert_eq!(overview.student_grades.len(), 2);
        assert!(overview.student_grades.iter().all(|entry| entry.student.id != idle.id));
        assert_eq!(overview.overall_class_average, 70.0);

        let detail = course_detail(scenario.store.as_ref(), scenario.course.id).await.unwrap();
        assert_eq!(detail.student_details.len(), 3);
        let idle_grade = detail.student_details.iter().find(|entry| entry.student.id == idle.id);
        assert!(idle_grade.is_some_and(|entry| entry.grade.is_none()));
    }

    #[tokio::test]
    async fn student_overview_lists_graded_courses() {
        let scenario = ExamScenario::open_now().await;
        let overview = student_overview(scenario.store.as_ref(), scenario.student.id).await.unwrap();
        assert!(overview.courses.is_empty());
        assert_eq!(overview.overall_average, None);

        seed::finalized_attempt(&scenario, scenario.exam.id, scenario.student.id, 4.0).await;
        let overview = student_overview(scenario.store.as_ref(), scenario.student.id).await.unwrap();
        assert_eq!(overview.courses.len(), 1);
        assert_eq!(overview.courses[0].grade.midterm_score, 80.0);
        assert_eq!(overview.overall_average, Some(80.0));

        let err = student_overview(scenario.store.as_ref(), scenario.instructor.id).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn student_result_needs_a_finalized_attempt() {
        let scenario = ExamScenario::open_now().await;
        let err = student_exam_result(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.exam.id,
            scenario.student.id,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "not_found");

        scenario.start().await;
        let err = student_exam_result(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.exam.id,
            scenario.student.id,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "not_found");

        // Reading after the deadline settles the attempt first.
        scenario.clock.advance(Duration::minutes(scenario.exam.duration_minutes as i64));
        let result = student_exam_result(
            scenario.store.as_ref(),
            scenario.clock.as_ref(),
            scenario.exam.id,
            scenario.student.id,
        )
        .await
        .unwrap();
        assert_eq!(result.my_result.score, 0.0);
        assert_eq!(result.statistics.total_participants, 1);
    }

    #[tokio::test]
    async fn weighted_grade_through_the_store() {
        let scenario = ExamScenario::open_now().await;
        let final_exam = seed::exam(
            &scenario,
            ExamType::Final,
            scenario.exam.start_time,
            scenario.exam.end_time,
        )
        .await;
        seed::questions(scenario.store.as_ref(), final_exam.id, 5).await;
        // Midterm weight 40 at 4/5 points, final weight 60 at 3/5 points.
        seed::finalized_attempt(&scenario, scenario.exam.id, scenario.student.id, 4.0).await;
        seed::finalized_attempt(&scenario, final_exam.id, scenario.student.id, 3.0).await;

        let grade = grading::course_grade(scenario.store.as_ref(), scenario.student.id, scenario.course.id)
            .await
            .unwrap()
            .expect("graded");
        assert_eq!(grade.midterm_score, 80.0);
        assert_eq!(grade.final_score, 60.0);
        assert_eq!(grade.final_grade, 68.0);
    }
}
