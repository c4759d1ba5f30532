use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use super::{
    answers, attempts, courses, departments, enrollments, exams, questions, users, CreateAnswer,
    CreateAttempt, CreateCourse, CreateDepartment, CreateEnrollment, CreateExam, CreateOption,
    CreateQuestion, CreateUser, Store, StoreError, StoreResult, UnitOfWork,
};
use crate::db::models::{
    AnswerOption, Course, Department, Enrollment, Exam, ExamAttempt, Question,
    QuestionWithOptions, StudentAnswer, User,
};
use crate::db::types::UserRole;

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// One transaction. Rolled back by sqlx when dropped uncommitted.
pub(crate) struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>> {
        users::find_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        users::find_by_email(&mut *self.tx, email).await.map_err(StoreError::from_sqlx)
    }

    async fn list_users(&mut self, role: Option<UserRole>) -> StoreResult<Vec<User>> {
        users::list(&mut *self.tx, role).await.map_err(StoreError::from_sqlx)
    }

    async fn count_users(&mut self, role: UserRole) -> StoreResult<i64> {
        users::count_by_role(&mut *self.tx, role).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_user(&mut self, params: CreateUser) -> StoreResult<User> {
        users::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn update_user_credentials(
        &mut self,
        id: i64,
        hashed_password: &str,
        role: UserRole,
    ) -> StoreResult<()> {
        users::update_credentials(&mut *self.tx, id, hashed_password, role)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn delete_user(&mut self, id: i64) -> StoreResult<bool> {
        users::delete_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_department(&mut self, id: i64) -> StoreResult<Option<Department>> {
        departments::find_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_department_by_code(&mut self, code: &str) -> StoreResult<Option<Department>> {
        departments::find_by_code(&mut *self.tx, code).await.map_err(StoreError::from_sqlx)
    }

    async fn list_departments(&mut self) -> StoreResult<Vec<Department>> {
        departments::list(&mut *self.tx).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_department(&mut self, params: CreateDepartment) -> StoreResult<Department> {
        departments::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn delete_department(&mut self, id: i64) -> StoreResult<bool> {
        departments::delete_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_course(&mut self, id: i64) -> StoreResult<Option<Course>> {
        courses::find_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>> {
        courses::find_by_code(&mut *self.tx, code).await.map_err(StoreError::from_sqlx)
    }

    async fn list_courses(&mut self) -> StoreResult<Vec<Course>> {
        courses::list(&mut *self.tx).await.map_err(StoreError::from_sqlx)
    }

    async fn list_courses_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Course>> {
        courses::list_by_instructor(&mut *self.tx, instructor_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn list_courses_by_department(
        &mut self,
        department_id: i64,
    ) -> StoreResult<Vec<Course>> {
        courses::list_by_department(&mut *self.tx, department_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn insert_course(&mut self, params: CreateCourse) -> StoreResult<Course> {
        courses::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn set_course_instructor(
        &mut self,
        course_id: i64,
        instructor_id: i64,
    ) -> StoreResult<Option<Course>> {
        courses::set_instructor(&mut *self.tx, course_id, instructor_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn delete_course(&mut self, id: i64) -> StoreResult<bool> {
        courses::delete_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_enrollment(&mut self, id: i64) -> StoreResult<Option<Enrollment>> {
        enrollments::find_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_enrollment_for(
        &mut self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        enrollments::find_for(&mut *self.tx, student_id, course_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn list_enrollments(&mut self) -> StoreResult<Vec<Enrollment>> {
        enrollments::list(&mut *self.tx).await.map_err(StoreError::from_sqlx)
    }

    async fn list_enrollments_for_student(
        &mut self,
        student_id: i64,
    ) -> StoreResult<Vec<Enrollment>> {
        enrollments::list_by_student(&mut *self.tx, student_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn list_enrollments_for_course(
        &mut self,
        course_id: i64,
    ) -> StoreResult<Vec<Enrollment>> {
        enrollments::list_by_course(&mut *self.tx, course_id).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_enrollment(&mut self, params: CreateEnrollment) -> StoreResult<Enrollment> {
        enrollments::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn delete_enrollment(&mut self, id: i64) -> StoreResult<bool> {
        enrollments::delete_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn delete_enrollments_for_student(&mut self, student_id: i64) -> StoreResult<u64> {
        enrollments::delete_by_student(&mut *self.tx, student_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn find_exam(&mut self, id: i64) -> StoreResult<Option<Exam>> {
        exams::find_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn list_exams_for_course(&mut self, course_id: i64) -> StoreResult<Vec<Exam>> {
        exams::list_by_course(&mut *self.tx, course_id).await.map_err(StoreError::from_sqlx)
    }

    async fn list_exams_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Exam>> {
        exams::list_by_instructor(&mut *self.tx, instructor_id)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn insert_exam(&mut self, params: CreateExam) -> StoreResult<Exam> {
        exams::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn update_exam(&mut self, exam: &Exam) -> StoreResult<()> {
        exams::update_schedule(&mut *self.tx, exam).await.map_err(StoreError::from_sqlx)
    }

    async fn list_questions(&mut self, exam_id: i64) -> StoreResult<Vec<QuestionWithOptions>> {
        let rows =
            questions::list_by_exam(&mut *self.tx, exam_id).await.map_err(StoreError::from_sqlx)?;
        let ids: Vec<i64> = rows.iter().map(|question| question.id).collect();
        let options =
            questions::list_options(&mut *self.tx, &ids).await.map_err(StoreError::from_sqlx)?;
        Ok(questions::attach_options(rows, options))
    }

    async fn find_question(&mut self, id: i64) -> StoreResult<Option<QuestionWithOptions>> {
        let Some(question) =
            questions::find_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)?
        else {
            return Ok(None);
        };
        let options =
            questions::list_options(&mut *self.tx, &[id]).await.map_err(StoreError::from_sqlx)?;
        Ok(Some(QuestionWithOptions { question, options }))
    }

    async fn count_questions(&mut self, exam_id: i64) -> StoreResult<i64> {
        questions::count_by_exam(&mut *self.tx, exam_id).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_question(&mut self, params: CreateQuestion) -> StoreResult<Question> {
        questions::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn update_question(&mut self, question: &Question) -> StoreResult<()> {
        questions::update(&mut *self.tx, question).await.map_err(StoreError::from_sqlx)
    }

    async fn delete_question(&mut self, id: i64) -> StoreResult<bool> {
        questions::delete_by_id(&mut *self.tx, id).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_option(&mut self, params: CreateOption) -> StoreResult<AnswerOption> {
        questions::create_option(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn delete_options(&mut self, question_id: i64) -> StoreResult<u64> {
        questions::delete_options(&mut *self.tx, question_id).await.map_err(StoreError::from_sqlx)
    }

    async fn find_attempt(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> StoreResult<Option<ExamAttempt>> {
        attempts::find_for(&mut *self.tx, exam_id, student_id).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_attempt(&mut self, params: CreateAttempt) -> StoreResult<Option<ExamAttempt>> {
        attempts::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn list_attempts_for_exam(&mut self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>> {
        attempts::list_by_exam(&mut *self.tx, exam_id).await.map_err(StoreError::from_sqlx)
    }

    async fn list_open_attempts(&mut self) -> StoreResult<Vec<ExamAttempt>> {
        attempts::list_open(&mut *self.tx).await.map_err(StoreError::from_sqlx)
    }

    async fn finalize_attempt(
        &mut self,
        attempt_id: i64,
        total_score: f64,
        at: PrimitiveDateTime,
    ) -> StoreResult<bool> {
        attempts::finalize(&mut *self.tx, attempt_id, total_score, at)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn list_answers(&mut self, attempt_id: i64) -> StoreResult<Vec<StudentAnswer>> {
        answers::list_by_attempt(&mut *self.tx, attempt_id).await.map_err(StoreError::from_sqlx)
    }

    async fn delete_answers(&mut self, attempt_id: i64) -> StoreResult<u64> {
        answers::delete_by_attempt(&mut *self.tx, attempt_id).await.map_err(StoreError::from_sqlx)
    }

    async fn insert_answer(&mut self, params: CreateAnswer) -> StoreResult<StudentAnswer> {
        answers::create(&mut *self.tx, params).await.map_err(StoreError::from_sqlx)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await.map_err(StoreError::from_sqlx)
    }
}
