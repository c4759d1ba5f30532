use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    CreateAnswer, CreateAttempt, CreateCourse, CreateDepartment, CreateEnrollment, CreateExam,
    CreateOption, CreateQuestion, CreateUser, Store, StoreError, StoreResult, UnitOfWork,
};
use crate::db::models::{
    AnswerOption, Course, Department, Enrollment, Exam, ExamAttempt, Question,
    QuestionWithOptions, StudentAnswer, User,
};
use crate::db::types::UserRole;

/// Process-local store with the same constraint and cascade behaviour as the schema.
///
/// A unit of work holds the lock for its whole lifetime and edits a copy of the data;
/// `commit` swaps the copy in, dropping discards it.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    users: BTreeMap<i64, User>,
    departments: BTreeMap<i64, Department>,
    courses: BTreeMap<i64, Course>,
    enrollments: BTreeMap<i64, Enrollment>,
    exams: BTreeMap<i64, Exam>,
    questions: BTreeMap<i64, Question>,
    options: BTreeMap<i64, AnswerOption>,
    attempts: BTreeMap<i64, ExamAttempt>,
    answers: BTreeMap<i64, StudentAnswer>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn options_of(&self, question_id: i64) -> Vec<AnswerOption> {
        self.options.values().filter(|option| option.question_id == question_id).cloned().collect()
    }

    fn remove_attempt(&mut self, attempt_id: i64) {
        self.attempts.remove(&attempt_id);
        self.answers.retain(|_, answer| answer.attempt_id != attempt_id);
    }

    fn remove_question(&mut self, question_id: i64) {
        self.questions.remove(&question_id);
        self.remove_options(question_id);
        self.answers.retain(|_, answer| answer.question_id != question_id);
    }

    fn remove_options(&mut self, question_id: i64) -> u64 {
        let doomed: Vec<i64> = self
            .options
            .values()
            .filter(|option| option.question_id == question_id)
            .map(|option| option.id)
            .collect();
        for id in &doomed {
            self.options.remove(id);
        }
        for answer in self.answers.values_mut() {
            if answer.selected_option_id.is_some_and(|selected| doomed.contains(&selected)) {
                answer.selected_option_id = None;
            }
        }
        doomed.len() as u64
    }

    fn remove_exam(&mut self, exam_id: i64) {
        self.exams.remove(&exam_id);
        let questions: Vec<i64> = self
            .questions
            .values()
            .filter(|question| question.exam_id == exam_id)
            .map(|question| question.id)
            .collect();
        for id in questions {
            self.remove_question(id);
        }
        let attempts: Vec<i64> = self
            .attempts
            .values()
            .filter(|attempt| attempt.exam_id == exam_id)
            .map(|attempt| attempt.id)
            .collect();
        for id in attempts {
            self.remove_attempt(id);
        }
    }
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict(constraint.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, work }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

pub(crate) struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.work.users.values().find(|user| user.email == email).cloned())
    }

    async fn list_users(&mut self, role: Option<UserRole>) -> StoreResult<Vec<User>> {
        Ok(self
            .work
            .users
            .values()
            .filter(|user| role.map_or(true, |role| user.role == role))
            .cloned()
            .collect())
    }

    async fn count_users(&mut self, role: UserRole) -> StoreResult<i64> {
        Ok(self.work.users.values().filter(|user| user.role == role).count() as i64)
    }

    async fn insert_user(&mut self, params: CreateUser) -> StoreResult<User> {
        if self.work.users.values().any(|user| user.email == params.email) {
            return Err(conflict("users_email_key"));
        }
        let user = User {
            id: self.work.next_id(),
            email: params.email,
            hashed_password: params.hashed_password,
            role: params.role,
            full_name: params.full_name,
            created_at: params.created_at,
        };
        self.work.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user_credentials(
        &mut self,
        id: i64,
        hashed_password: &str,
        role: UserRole,
    ) -> StoreResult<()> {
        if let Some(user) = self.work.users.get_mut(&id) {
            user.hashed_password = hashed_password.to_string();
            user.role = role;
        }
        Ok(())
    }

    async fn delete_user(&mut self, id: i64) -> StoreResult<bool> {
        if !self.work.users.contains_key(&id) {
            return Ok(false);
        }
        if self.work.courses.values().any(|course| course.instructor_id == id) {
            return Err(conflict("courses_instructor_id_fkey"));
        }
        if self.work.exams.values().any(|exam| exam.instructor_id == id) {
            return Err(conflict("exams_instructor_id_fkey"));
        }
        self.work.users.remove(&id);
        self.work.enrollments.retain(|_, enrollment| enrollment.student_id != id);
        let attempts: Vec<i64> = self
            .work
            .attempts
            .values()
            .filter(|attempt| attempt.student_id == id)
            .map(|attempt| attempt.id)
            .collect();
        for attempt_id in attempts {
            self.work.remove_attempt(attempt_id);
        }
        Ok(true)
    }

    async fn find_department(&mut self, id: i64) -> StoreResult<Option<Department>> {
        Ok(self.work.departments.get(&id).cloned())
    }

    async fn find_department_by_code(&mut self, code: &str) -> StoreResult<Option<Department>> {
        Ok(self.work.departments.values().find(|department| department.code == code).cloned())
    }

    async fn list_departments(&mut self) -> StoreResult<Vec<Department>> {
        Ok(self.work.departments.values().cloned().collect())
    }

    async fn insert_department(&mut self, params: CreateDepartment) -> StoreResult<Department> {
        if self.work.departments.values().any(|department| department.code == params.code) {
            return Err(conflict("departments_code_key"));
        }
        let department =
            Department { id: self.work.next_id(), name: params.name, code: params.code };
        self.work.departments.insert(department.id, department.clone());
        Ok(department)
    }

    async fn delete_department(&mut self, id: i64) -> StoreResult<bool> {
        if self.work.courses.values().any(|course| course.department_id == id) {
            return Err(conflict("courses_department_id_fkey"));
        }
        Ok(self.work.departments.remove(&id).is_some())
    }

    async fn find_course(&mut self, id: i64) -> StoreResult<Option<Course>> {
        Ok(self.work.courses.get(&id).cloned())
    }

    async fn find_course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>> {
        Ok(self.work.courses.values().find(|course| course.code == code).cloned())
    }

    async fn list_courses(&mut self) -> StoreResult<Vec<Course>> {
        Ok(self.work.courses.values().cloned().collect())
    }

    async fn list_courses_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Course>> {
        Ok(self
            .work
            .courses
            .values()
            .filter(|course| course.instructor_id == instructor_id)
            .cloned()
            .collect())
    }

    async fn list_courses_by_department(
        &mut self,
        department_id: i64,
    ) -> StoreResult<Vec<Course>> {
        Ok(self
            .work
            .courses
            .values()
            .filter(|course| course.department_id == department_id)
            .cloned()
            .collect())
    }

    async fn insert_course(&mut self, params: CreateCourse) -> StoreResult<Course> {
        if self.work.courses.values().any(|course| course.code == params.code) {
            return Err(conflict("courses_code_key"));
        }
        if !self.work.departments.contains_key(&params.department_id) {
            return Err(conflict("courses_department_id_fkey"));
        }
        if !self.work.users.contains_key(&params.instructor_id) {
            return Err(conflict("courses_instructor_id_fkey"));
        }
        let course = Course {
            id: self.work.next_id(),
            code: params.code,
            name: params.name,
            department_id: params.department_id,
            instructor_id: params.instructor_id,
        };
        self.work.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn set_course_instructor(
        &mut self,
        course_id: i64,
        instructor_id: i64,
    ) -> StoreResult<Option<Course>> {
        if !self.work.users.contains_key(&instructor_id) {
            return Err(conflict("courses_instructor_id_fkey"));
        }
        Ok(self.work.courses.get_mut(&course_id).map(|course| {
            course.instructor_id = instructor_id;
            course.clone()
        }))
    }

    async fn delete_course(&mut self, id: i64) -> StoreResult<bool> {
        if self.work.courses.remove(&id).is_none() {
            return Ok(false);
        }
        self.work.enrollments.retain(|_, enrollment| enrollment.course_id != id);
        let exams: Vec<i64> =
            self.work.exams.values().filter(|exam| exam.course_id == id).map(|exam| exam.id).collect();
        for exam_id in exams {
            self.work.remove_exam(exam_id);
        }
        Ok(true)
    }

    async fn find_enrollment(&mut self, id: i64) -> StoreResult<Option<Enrollment>> {
        Ok(self.work.enrollments.get(&id).cloned())
    }

    async fn find_enrollment_for(
        &mut self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .work
            .enrollments
            .values()
            .find(|enrollment| {
                enrollment.student_id == student_id && enrollment.course_id == course_id
            })
            .cloned())
    }

    async fn list_enrollments(&mut self) -> StoreResult<Vec<Enrollment>> {
        Ok(self.work.enrollments.values().cloned().collect())
    }

    async fn list_enrollments_for_student(
        &mut self,
        student_id: i64,
    ) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .work
            .enrollments
            .values()
            .filter(|enrollment| enrollment.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_enrollments_for_course(
        &mut self,
        course_id: i64,
    ) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .work
            .enrollments
            .values()
            .filter(|enrollment| enrollment.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn insert_enrollment(&mut self, params: CreateEnrollment) -> StoreResult<Enrollment> {
        if self.work.enrollments.values().any(|enrollment| {
            enrollment.student_id == params.student_id && enrollment.course_id == params.course_id
        }) {
            return Err(conflict("unique_student_course"));
        }
        if !self.work.users.contains_key(&params.student_id)
            || !self.work.courses.contains_key(&params.course_id)
        {
            return Err(conflict("student_courses_fkey"));
        }
        let enrollment = Enrollment {
            id: self.work.next_id(),
            student_id: params.student_id,
            course_id: params.course_id,
            enrollment_date: params.enrollment_date,
        };
        self.work.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn delete_enrollment(&mut self, id: i64) -> StoreResult<bool> {
        Ok(self.work.enrollments.remove(&id).is_some())
    }

    async fn delete_enrollments_for_student(&mut self, student_id: i64) -> StoreResult<u64> {
        let before = self.work.enrollments.len();
        self.work.enrollments.retain(|_, enrollment| enrollment.student_id != student_id);
        Ok((before - self.work.enrollments.len()) as u64)
    }

    async fn find_exam(&mut self, id: i64) -> StoreResult<Option<Exam>> {
        Ok(self.work.exams.get(&id).cloned())
    }

    async fn list_exams_for_course(&mut self, course_id: i64) -> StoreResult<Vec<Exam>> {
        let mut exams: Vec<Exam> =
            self.work.exams.values().filter(|exam| exam.course_id == course_id).cloned().collect();
        exams.sort_by_key(|exam| (exam.start_time, exam.id));
        Ok(exams)
    }

    async fn list_exams_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Exam>> {
        let mut exams: Vec<Exam> = self
            .work
            .exams
            .values()
            .filter(|exam| exam.instructor_id == instructor_id)
            .cloned()
            .collect();
        exams.sort_by_key(|exam| (exam.start_time, exam.id));
        Ok(exams)
    }

    async fn insert_exam(&mut self, params: CreateExam) -> StoreResult<Exam> {
        if !self.work.courses.contains_key(&params.course_id) {
            return Err(conflict("exams_course_id_fkey"));
        }
        if params.start_time >= params.end_time {
            return Err(conflict("exams_window_check"));
        }
        let exam = Exam {
            id: self.work.next_id(),
            course_id: params.course_id,
            instructor_id: params.instructor_id,
            exam_type: params.exam_type,
            start_time: params.start_time,
            end_time: params.end_time,
            duration_minutes: params.duration_minutes,
            weight_percentage: params.weight_percentage,
            created_at: params.created_at,
        };
        self.work.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn update_exam(&mut self, exam: &Exam) -> StoreResult<()> {
        if exam.start_time >= exam.end_time {
            return Err(conflict("exams_window_check"));
        }
        if let Some(stored) = self.work.exams.get_mut(&exam.id) {
            stored.start_time = exam.start_time;
            stored.end_time = exam.end_time;
            stored.duration_minutes = exam.duration_minutes;
            stored.weight_percentage = exam.weight_percentage;
        }
        Ok(())
    }

    async fn list_questions(&mut self, exam_id: i64) -> StoreResult<Vec<QuestionWithOptions>> {
        Ok(self
            .work
            .questions
            .values()
            .filter(|question| question.exam_id == exam_id)
            .map(|question| QuestionWithOptions {
                question: question.clone(),
                options: self.work.options_of(question.id),
            })
            .collect())
    }

    async fn find_question(&mut self, id: i64) -> StoreResult<Option<QuestionWithOptions>> {
        Ok(self.work.questions.get(&id).map(|question| QuestionWithOptions {
            question: question.clone(),
            options: self.work.options_of(id),
        }))
    }

    async fn count_questions(&mut self, exam_id: i64) -> StoreResult<i64> {
        Ok(self.work.questions.values().filter(|question| question.exam_id == exam_id).count()
            as i64)
    }

    async fn insert_question(&mut self, params: CreateQuestion) -> StoreResult<Question> {
        if !self.work.exams.contains_key(&params.exam_id) {
            return Err(conflict("questions_exam_id_fkey"));
        }
        let question = Question {
            id: self.work.next_id(),
            exam_id: params.exam_id,
            question_text: params.question_text,
            question_type: params.question_type,
            points: params.points,
        };
        self.work.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn update_question(&mut self, question: &Question) -> StoreResult<()> {
        if let Some(stored) = self.work.questions.get_mut(&question.id) {
            stored.question_text = question.question_text.clone();
            stored.points = question.points;
        }
        Ok(())
    }

    async fn delete_question(&mut self, id: i64) -> StoreResult<bool> {
        if !self.work.questions.contains_key(&id) {
            return Ok(false);
        }
        self.work.remove_question(id);
        Ok(true)
    }

    async fn insert_option(&mut self, params: CreateOption) -> StoreResult<AnswerOption> {
        if !self.work.questions.contains_key(&params.question_id) {
            return Err(conflict("answer_options_question_id_fkey"));
        }
        let option = AnswerOption {
            id: self.work.next_id(),
            question_id: params.question_id,
            option_text: params.option_text,
            is_correct: params.is_correct,
        };
        self.work.options.insert(option.id, option.clone());
        Ok(option)
    }

    async fn delete_options(&mut self, question_id: i64) -> StoreResult<u64> {
        Ok(self.work.remove_options(question_id))
    }

    async fn find_attempt(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> StoreResult<Option<ExamAttempt>> {
        Ok(self
            .work
            .attempts
            .values()
            .find(|attempt| attempt.exam_id == exam_id && attempt.student_id == student_id)
            .cloned())
    }

    async fn insert_attempt(&mut self, params: CreateAttempt) -> StoreResult<Option<ExamAttempt>> {
        let taken = self.work.attempts.values().any(|attempt| {
            attempt.exam_id == params.exam_id && attempt.student_id == params.student_id
        });
        if taken {
            return Ok(None);
        }
        if !self.work.exams.contains_key(&params.exam_id)
            || !self.work.users.contains_key(&params.student_id)
        {
            return Err(conflict("exam_attempts_fkey"));
        }
        let attempt = ExamAttempt {
            id: self.work.next_id(),
            exam_id: params.exam_id,
            student_id: params.student_id,
            start_time: params.start_time,
            end_time: None,
            submitted_at: None,
            total_score: 0.0,
        };
        self.work.attempts.insert(attempt.id, attempt.clone());
        Ok(Some(attempt))
    }

    async fn list_attempts_for_exam(&mut self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>> {
        Ok(self.work.attempts.values().filter(|attempt| attempt.exam_id == exam_id).cloned().collect())
    }

    async fn list_open_attempts(&mut self) -> StoreResult<Vec<ExamAttempt>> {
        Ok(self.work.attempts.values().filter(|attempt| !attempt.is_finalized()).cloned().collect())
    }

    async fn finalize_attempt(
        &mut self,
        attempt_id: i64,
        total_score: f64,
        at: PrimitiveDateTime,
    ) -> StoreResult<bool> {
        match self.work.attempts.get_mut(&attempt_id) {
            Some(attempt) if !attempt.is_finalized() => {
                attempt.total_score = total_score;
                attempt.submitted_at = Some(at);
                attempt.end_time = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_answers(&mut self, attempt_id: i64) -> StoreResult<Vec<StudentAnswer>> {
        Ok(self
            .work
            .answers
            .values()
            .filter(|answer| answer.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn delete_answers(&mut self, attempt_id: i64) -> StoreResult<u64> {
        let before = self.work.answers.len();
        self.work.answers.retain(|_, answer| answer.attempt_id != attempt_id);
        Ok((before - self.work.answers.len()) as u64)
    }

    async fn insert_answer(&mut self, params: CreateAnswer) -> StoreResult<StudentAnswer> {
        if !self.work.attempts.contains_key(&params.attempt_id)
            || !self.work.questions.contains_key(&params.question_id)
        {
            return Err(conflict("student_answers_fkey"));
        }
        let answer = StudentAnswer {
            id: self.work.next_id(),
            attempt_id: params.attempt_id,
            question_id: params.question_id,
            selected_option_id: params.selected_option_id,
            is_correct: params.is_correct,
            points_earned: params.points_earned,
        };
        self.work.answers.insert(answer.id, answer.clone());
        Ok(answer)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
