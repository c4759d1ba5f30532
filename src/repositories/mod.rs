//! Persistence seam.
//!
//! Services talk to a [`Store`] and do all reads and writes of one operation inside a
//! [`UnitOfWork`]. Dropping a unit of work without calling `commit` discards every change
//! it made. The Postgres implementation maps that onto a transaction; the in-memory one
//! onto a working copy guarded by an async mutex.

pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod courses;
pub(crate) mod departments;
pub(crate) mod enrollments;
pub(crate) mod exams;
pub(crate) mod memory;
pub(crate) mod postgres;
pub(crate) mod questions;
pub(crate) mod users;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{
    AnswerOption, Course, Department, Enrollment, Exam, ExamAttempt, Question,
    QuestionWithOptions, StudentAnswer, User,
};
use crate::db::types::UserRole;

pub(crate) use answers::CreateAnswer;
pub(crate) use attempts::CreateAttempt;
pub(crate) use courses::CreateCourse;
pub(crate) use departments::CreateDepartment;
pub(crate) use enrollments::CreateEnrollment;
pub(crate) use exams::CreateExam;
pub(crate) use questions::{CreateOption, CreateQuestion};
pub(crate) use users::CreateUser;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violated: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Unique and foreign-key violations become `Conflict` so callers can report them.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::Conflict(constraint);
            }
        }
        StoreError::Database(err)
    }
}

pub(crate) type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub(crate) trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    async fn ping(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub(crate) trait UnitOfWork: Send {
    // users
    async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&mut self, role: Option<UserRole>) -> StoreResult<Vec<User>>;
    async fn count_users(&mut self, role: UserRole) -> StoreResult<i64>;
    async fn insert_user(&mut self, params: CreateUser) -> StoreResult<User>;
    async fn update_user_credentials(
        &mut self,
        id: i64,
        hashed_password: &str,
        role: UserRole,
    ) -> StoreResult<()>;
    async fn delete_user(&mut self, id: i64) -> StoreResult<bool>;

    // departments
    async fn find_department(&mut self, id: i64) -> StoreResult<Option<Department>>;
    async fn find_department_by_code(&mut self, code: &str) -> StoreResult<Option<Department>>;
    async fn list_departments(&mut self) -> StoreResult<Vec<Department>>;
    async fn insert_department(&mut self, params: CreateDepartment) -> StoreResult<Department>;
    async fn delete_department(&mut self, id: i64) -> StoreResult<bool>;

    // courses
    async fn find_course(&mut self, id: i64) -> StoreResult<Option<Course>>;
    async fn find_course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>>;
    async fn list_courses(&mut self) -> StoreResult<Vec<Course>>;
    async fn list_courses_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Course>>;
    async fn list_courses_by_department(&mut self, department_id: i64)
        -> StoreResult<Vec<Course>>;
    async fn insert_course(&mut self, params: CreateCourse) -> StoreResult<Course>;
    async fn set_course_instructor(
        &mut self,
        course_id: i64,
        instructor_id: i64,
    ) -> StoreResult<Option<Course>>;
    async fn delete_course(&mut self, id: i64) -> StoreResult<bool>;

    // enrollments
    async fn find_enrollment(&mut self, id: i64) -> StoreResult<Option<Enrollment>>;
    async fn find_enrollment_for(
        &mut self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>>;
    async fn list_enrollments(&mut self) -> StoreResult<Vec<Enrollment>>;
    async fn list_enrollments_for_student(&mut self, student_id: i64)
        -> StoreResult<Vec<Enrollment>>;
    async fn list_enrollments_for_course(&mut self, course_id: i64)
        -> StoreResult<Vec<Enrollment>>;
    async fn insert_enrollment(&mut self, params: CreateEnrollment) -> StoreResult<Enrollment>;
    async fn delete_enrollment(&mut self, id: i64) -> StoreResult<bool>;
    async fn delete_enrollments_for_student(&mut self, student_id: i64) -> StoreResult<u64>;

    // exams
    async fn find_exam(&mut self, id: i64) -> StoreResult<Option<Exam>>;
    /// Ordered by start time, then id.
    async fn list_exams_for_course(&mut self, course_id: i64) -> StoreResult<Vec<Exam>>;
    async fn list_exams_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Exam>>;
    async fn insert_exam(&mut self, params: CreateExam) -> StoreResult<Exam>;
    async fn update_exam(&mut self, exam: &Exam) -> StoreResult<()>;

    // questions and options, stored order
    async fn list_questions(&mut self, exam_id: i64) -> StoreResult<Vec<QuestionWithOptions>>;
    async fn find_question(&mut self, id: i64) -> StoreResult<Option<QuestionWithOptions>>;
    async fn count_questions(&mut self, exam_id: i64) -> StoreResult<i64>;
    async fn insert_question(&mut self, params: CreateQuestion) -> StoreResult<Question>;
    async fn update_question(&mut self, question: &Question) -> StoreResult<()>;
    async fn delete_question(&mut self, id: i64) -> StoreResult<bool>;
    async fn insert_option(&mut self, params: CreateOption) -> StoreResult<AnswerOption>;
    async fn delete_options(&mut self, question_id: i64) -> StoreResult<u64>;

    // attempts
    async fn find_attempt(&mut self, exam_id: i64, student_id: i64)
        -> StoreResult<Option<ExamAttempt>>;
    /// `None` when an attempt for the pair already exists.
    async fn insert_attempt(&mut self, params: CreateAttempt) -> StoreResult<Option<ExamAttempt>>;
    async fn list_attempts_for_exam(&mut self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>>;
    async fn list_open_attempts(&mut self) -> StoreResult<Vec<ExamAttempt>>;
    /// Sets score and timestamps only while the attempt is still open.
    async fn finalize_attempt(
        &mut self,
        attempt_id: i64,
        total_score: f64,
        at: PrimitiveDateTime,
    ) -> StoreResult<bool>;

    // answers
    async fn list_answers(&mut self, attempt_id: i64) -> StoreResult<Vec<StudentAnswer>>;
    async fn delete_answers(&mut self, attempt_id: i64) -> StoreResult<u64>;
    async fn insert_answer(&mut self, params: CreateAnswer) -> StoreResult<StudentAnswer>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
