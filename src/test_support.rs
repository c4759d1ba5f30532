use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};

use crate::api;
use crate::core::{clock::Clock, config::Settings, security, state::AppState};
use crate::db::models::User;
use crate::repositories::Store;

const TEST_SECRET_KEY: &str = "test-secret";

/// Settings built from fixed defaults plus `overrides`; the process environment is ignored.
pub(crate) fn test_settings(overrides: &[(&str, &str)]) -> Settings {
    let defaults = [
        ("EXAMDESK_ENV", "test"),
        ("EXAMDESK_STORE", "memory"),
        ("SECRET_KEY", TEST_SECRET_KEY),
        ("PROMETHEUS_ENABLED", "0"),
    ];
    let lookup = |key: &str| {
        overrides
            .iter()
            .chain(defaults.iter())
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    };
    Settings::from_lookup(&lookup).expect("test settings")
}

pub(crate) struct TestApp {
    pub(crate) state: AppState,
    pub(crate) app: Router,
}

/// Router over the scenario's store and clock.
pub(crate) fn test_app(scenario: &seed::ExamScenario) -> TestApp {
    test_app_with(scenario, &[])
}

pub(crate) fn test_app_with(scenario: &seed::ExamScenario, overrides: &[(&str, &str)]) -> TestApp {
    let store: Arc<dyn Store> = scenario.store.clone();
    let clock: Arc<dyn Clock> = scenario.clock.clone();
    let state = AppState::new(test_settings(overrides), store, clock);
    let app = api::router::router(state.clone());
    TestApp { state, app }
}

pub(crate) fn bearer_token(user: &User, settings: &Settings) -> String {
    security::create_access_token(user.id, user.role, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

/// Seeding helpers over the in-memory store.
pub(crate) mod seed {
    use std::sync::{Arc, OnceLock};

    use time::macros::datetime;
    use time::{Duration, PrimitiveDateTime};

    use crate::core::clock::{Clock, FixedClock};
    use crate::core::security;
    use crate::db::models::{
        Course, Department, Enrollment, Exam, ExamAttempt, QuestionWithOptions, StudentAnswer,
        User,
    };
    use crate::db::types::{ExamType, QuestionType, UserRole};
    use crate::repositories::memory::MemoryStore;
    use crate::repositories::{
        CreateAnswer, CreateAttempt, CreateCourse, CreateDepartment, CreateEnrollment,
        CreateExam, CreateOption, CreateQuestion, CreateUser, Store,
    };

    pub(crate) const PASSWORD: &str = "password123";

    /// Monday 09:00 UTC, 12:00 civil time.
    pub(crate) const T0: PrimitiveDateTime = datetime!(2025-03-10 09:00);

    /// Argon2 is slow in debug builds, so every seeded user shares one hash.
    fn password_hash() -> String {
        static HASH: OnceLock<String> = OnceLock::new();
        HASH.get_or_init(|| security::hash_password(PASSWORD).expect("hash password")).clone()
    }

    /// One department, instructor, course and enrolled student, plus a midterm that is
    /// open right now and carries five one-point questions.
    pub(crate) struct ExamScenario {
        pub(crate) store: Arc<MemoryStore>,
        pub(crate) clock: Arc<FixedClock>,
        pub(crate) department: Department,
        pub(crate) instructor: User,
        pub(crate) student: User,
        pub(crate) course: Course,
        pub(crate) enrollment: Enrollment,
        pub(crate) exam: Exam,
        pub(crate) questions: Vec<QuestionWithOptions>,
    }

    impl ExamScenario {
        pub(crate) async fn open_now() -> Self {
            let store = Arc::new(MemoryStore::new());
            let clock = Arc::new(FixedClock::at(T0));

            let mut uow = store.begin().await.expect("begin");
            let department = uow
                .insert_department(CreateDepartment {
                    name: "Mathematics".into(),
                    code: "MATH".into(),
                })
                .await
                .expect("department");
            uow.commit().await.expect("commit");

            let instructor = user(store.as_ref(), "prof@uni.test", UserRole::Instructor).await;
            let student = user(store.as_ref(), "student@uni.test", UserRole::Student).await;

            let mut uow = store.begin().await.expect("begin");
            let course = uow
                .insert_course(CreateCourse {
                    code: "MATH101".into(),
                    name: "Calculus".into(),
                    department_id: department.id,
                    instructor_id: instructor.id,
                })
                .await
                .expect("course");
            let enrollment = uow
                .insert_enrollment(CreateEnrollment {
                    student_id: student.id,
                    course_id: course.id,
                    enrollment_date: T0 - Duration::days(30),
                })
                .await
                .expect("enrollment");
            let exam = uow
                .insert_exam(CreateExam {
                    course_id: course.id,
                    instructor_id: instructor.id,
                    exam_type: ExamType::Midterm,
                    start_time: T0 - Duration::hours(1),
                    end_time: T0 + Duration::hours(2),
                    duration_minutes: 30,
                    weight_percentage: 40.0,
                    created_at: T0 - Duration::days(7),
                })
                .await
                .expect("exam");
            uow.commit().await.expect("commit");

            let questions = questions(store.as_ref(), exam.id, 5).await;

            Self { store, clock, department, instructor, student, course, enrollment, exam, questions }
        }

        pub(crate) async fn start(&self) -> ExamAttempt {
            self.start_for(self.student.id).await
        }

        /// Inserts an open attempt started at the current clock reading.
        pub(crate) async fn start_for(&self, student_id: i64) -> ExamAttempt {
            let mut uow = self.store.begin().await.expect("begin");
            let attempt = uow
                .insert_attempt(CreateAttempt {
                    exam_id: self.exam.id,
                    student_id,
                    start_time: self.clock.now_utc(),
                })
                .await
                .expect("insert attempt")
                .expect("attempt not yet started");
            uow.commit().await.expect("commit");
            attempt
        }
    }

    pub(crate) async fn user(store: &dyn Store, email: &str, role: UserRole) -> User {
        let mut uow = store.begin().await.expect("begin");
        let user = uow
            .insert_user(CreateUser {
                email: email.to_string(),
                hashed_password: password_hash(),
                role,
                full_name: Some(format!("{} {}", role.as_str(), email)),
                created_at: T0 - Duration::days(60),
            })
            .await
            .expect("insert user");
        uow.commit().await.expect("commit");
        user
    }

    pub(crate) async fn enrolled_student(scenario: &ExamScenario, email: &str) -> User {
        let student = user(scenario.store.as_ref(), email, UserRole::Student).await;
        let mut uow = scenario.store.begin().await.expect("begin");
        uow.insert_enrollment(CreateEnrollment {
            student_id: student.id,
            course_id: scenario.course.id,
            enrollment_date: T0 - Duration::days(30),
        })
        .await
        .expect("enrollment");
        uow.commit().await.expect("commit");
        student
    }

    /// Another course in the scenario's department, taught by the scenario's instructor.
    pub(crate) async fn course(scenario: &ExamScenario, code: &str) -> Course {
        let mut uow = scenario.store.begin().await.expect("begin");
        let course = uow
            .insert_course(CreateCourse {
                code: code.to_string(),
                name: format!("Course {code}"),
                department_id: scenario.department.id,
                instructor_id: scenario.instructor.id,
            })
            .await
            .expect("course");
        uow.commit().await.expect("commit");
        course
    }

    /// An exam in the scenario's course; midterms weigh 40, finals 60.
    pub(crate) async fn exam(
        scenario: &ExamScenario,
        exam_type: ExamType,
        start_time: PrimitiveDateTime,
        end_time: PrimitiveDateTime,
    ) -> Exam {
        let weight_percentage = match exam_type {
            ExamType::Midterm => 40.0,
            ExamType::Final => 60.0,
        };
        let mut uow = scenario.store.begin().await.expect("begin");
        let exam = uow
            .insert_exam(CreateExam {
                course_id: scenario.course.id,
                instructor_id: scenario.instructor.id,
                exam_type,
                start_time,
                end_time,
                duration_minutes: 30,
                weight_percentage,
                created_at: T0 - Duration::days(7),
            })
            .await
            .expect("exam");
        uow.commit().await.expect("commit");
        exam
    }

    /// One-point questions with three options each; the first option is the correct one.
    pub(crate) async fn questions(
        store: &dyn Store,
        exam_id: i64,
        count: usize,
    ) -> Vec<QuestionWithOptions> {
        let mut uow = store.begin().await.expect("begin");
        let mut created = Vec::with_capacity(count);
        for n in 1..=count {
            let question = uow
                .insert_question(CreateQuestion {
                    exam_id,
                    question_text: format!("Question {n}"),
                    question_type: QuestionType::MultipleChoice,
                    points: 1.0,
                })
                .await
                .expect("question");
            let mut options = Vec::with_capacity(3);
            for (text, is_correct) in [("right", true), ("wrong", false), ("also wrong", false)] {
                let option = uow
                    .insert_option(CreateOption {
                        question_id: question.id,
                        option_text: format!("{text} {n}"),
                        is_correct,
                    })
                    .await
                    .expect("option");
                options.push(option);
            }
            created.push(QuestionWithOptions { question, options });
        }
        uow.commit().await.expect("commit");
        created
    }

    /// A submitted attempt with the given score and no stored answers.
    pub(crate) async fn finalized_attempt(
        scenario: &ExamScenario,
        exam_id: i64,
        student_id: i64,
        score: f64,
    ) -> ExamAttempt {
        let started = scenario.clock.now_utc() - Duration::minutes(20);
        let finished = scenario.clock.now_utc() - Duration::minutes(5);
        let mut uow = scenario.store.begin().await.expect("begin");
        let attempt = uow
            .insert_attempt(CreateAttempt { exam_id, student_id, start_time: started })
            .await
            .expect("insert attempt")
            .expect("attempt not yet started");
        assert!(uow.finalize_attempt(attempt.id, score, finished).await.expect("finalize"));
        let attempt = uow
            .find_attempt(exam_id, student_id)
            .await
            .expect("find attempt")
            .expect("attempt");
        uow.commit().await.expect("commit");
        attempt
    }

    /// Stores an answer to the scenario question at `question_index`.
    pub(crate) async fn stored_answer(
        scenario: &ExamScenario,
        attempt_id: i64,
        question_index: usize,
        correct: bool,
    ) -> StudentAnswer {
        let entry = &scenario.questions[question_index];
        let option = entry
            .options
            .iter()
            .find(|option| option.is_correct == correct)
            .expect("seeded option");
        let mut uow = scenario.store.begin().await.expect("begin");
        let answer = uow
            .insert_answer(CreateAnswer {
                attempt_id,
                question_id: entry.question.id,
                selected_option_id: Some(option.id),
                is_correct: correct,
                points_earned: if correct { entry.question.points } else { 0.0 },
            })
            .await
            .expect("answer");
        uow.commit().await.expect("commit");
        answer
    }
}

/// Store whose units of work read attempts as they stood before a competing request
/// changed them. Storage-level uniqueness and finalize-once rules then decide the outcome.
pub(crate) mod stale {
    use std::sync::Arc;

    use async_trait::async_trait;
    use time::PrimitiveDateTime;

    use crate::db::models::{
        AnswerOption, Course, Department, Enrollment, Exam, ExamAttempt, Question,
        QuestionWithOptions, StudentAnswer, User,
    };
    use crate::db::types::UserRole;
    use crate::repositories::memory::MemoryStore;
    use crate::repositories::{
        CreateAnswer, CreateAttempt, CreateCourse, CreateDepartment, CreateEnrollment,
        CreateExam, CreateOption, CreateQuestion, CreateUser, Store, StoreResult, UnitOfWork,
    };

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum AttemptView {
        /// The attempt has not been started yet.
        Missing,
        /// The attempt has not been submitted yet.
        Open,
    }

    pub(crate) struct StaleAttemptStore {
        inner: Arc<MemoryStore>,
        view: AttemptView,
    }

    impl StaleAttemptStore {
        pub(crate) fn new(inner: Arc<MemoryStore>, view: AttemptView) -> Self {
            Self { inner, view }
        }
    }

    #[async_trait]
    impl Store for StaleAttemptStore {
        async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
            let inner = self.inner.begin().await?;
            Ok(Box::new(StaleUnit { inner, view: self.view }))
        }

        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }

        fn backend_name(&self) -> &'static str {
            self.inner.backend_name()
        }
    }

    struct StaleUnit {
        inner: Box<dyn UnitOfWork>,
        view: AttemptView,
    }

    #[async_trait]
    impl UnitOfWork for StaleUnit {
        async fn find_user(&mut self, id: i64) -> StoreResult<Option<User>> {
            self.inner.find_user(id).await
        }

        async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
            self.inner.find_user_by_email(email).await
        }

        async fn list_users(&mut self, role: Option<UserRole>) -> StoreResult<Vec<User>> {
            self.inner.list_users(role).await
        }

        async fn count_users(&mut self, role: UserRole) -> StoreResult<i64> {
            self.inner.count_users(role).await
        }

        async fn insert_user(&mut self, params: CreateUser) -> StoreResult<User> {
            self.inner.insert_user(params).await
        }

        async fn update_user_credentials(
            &mut self,
            id: i64,
            hashed_password: &str,
            role: UserRole,
        ) -> StoreResult<()> {
            self.inner.update_user_credentials(id, hashed_password, role).await
        }

        async fn delete_user(&mut self, id: i64) -> StoreResult<bool> {
            self.inner.delete_user(id).await
        }

        async fn find_department(&mut self, id: i64) -> StoreResult<Option<Department>> {
            self.inner.find_department(id).await
        }

        async fn find_department_by_code(&mut self, code: &str) -> StoreResult<Option<Department>> {
            self.inner.find_department_by_code(code).await
        }

        async fn list_departments(&mut self) -> StoreResult<Vec<Department>> {
            self.inner.list_departments().await
        }

        async fn insert_department(&mut self, params: CreateDepartment) -> StoreResult<Department> {
            self.inner.insert_department(params).await
        }

        async fn delete_department(&mut self, id: i64) -> StoreResult<bool> {
            self.inner.delete_department(id).await
        }

        async fn find_course(&mut self, id: i64) -> StoreResult<Option<Course>> {
            self.inner.find_course(id).await
        }

        async fn find_course_by_code(&mut self, code: &str) -> StoreResult<Option<Course>> {
            self.inner.find_course_by_code(code).await
        }

        async fn list_courses(&mut self) -> StoreResult<Vec<Course>> {
            self.inner.list_courses().await
        }

        async fn list_courses_by_instructor(
            &mut self,
            instructor_id: i64,
        ) -> StoreResult<Vec<Course>> {
            self.inner.list_courses_by_instructor(instructor_id).await
        }

        async fn list_courses_by_department(
            &mut self,
            department_id: i64,
        ) -> StoreResult<Vec<Course>> {
            self.inner.list_courses_by_department(department_id).await
        }

        async fn insert_course(&mut self, params: CreateCourse) -> StoreResult<Course> {
            self.inner.insert_course(params).await
        }

        async fn set_course_instructor(
            &mut self,
            course_id: i64,
            instructor_id: i64,
        ) -> StoreResult<Option<Course>> {
            self.inner.set_course_instructor(course_id, instructor_id).await
        }

        async fn delete_course(&mut self, id: i64) -> StoreResult<bool> {
            self.inner.delete_course(id).await
        }

        async fn find_enrollment(&mut self, id: i64) -> StoreResult<Option<Enrollment>> {
            self.inner.find_enrollment(id).await
        }

        async fn find_enrollment_for(
            &mut self,
            student_id: i64,
            course_id: i64,
        ) -> StoreResult<Option<Enrollment>> {
            self.inner.find_enrollment_for(student_id, course_id).await
        }

        async fn list_enrollments(&mut self) -> StoreResult<Vec<Enrollment>> {
            self.inner.list_enrollments().await
        }

        async fn list_enrollments_for_student(
            &mut self,
            student_id: i64,
        ) -> StoreResult<Vec<Enrollment>> {
            self.inner.list_enrollments_for_student(student_id).await
        }

        async fn list_enrollments_for_course(
            &mut self,
            course_id: i64,
        ) -> StoreResult<Vec<Enrollment>> {
            self.inner.list_enrollments_for_course(course_id).await
        }

        async fn insert_enrollment(&mut self, params: CreateEnrollment) -> StoreResult<Enrollment> {
            self.inner.insert_enrollment(params).await
        }

        async fn delete_enrollment(&mut self, id: i64) -> StoreResult<bool> {
            self.inner.delete_enrollment(id).await
        }

        async fn delete_enrollments_for_student(&mut self, student_id: i64) -> StoreResult<u64> {
            self.inner.delete_enrollments_for_student(student_id).await
        }

        async fn find_exam(&mut self, id: i64) -> StoreResult<Option<Exam>> {
            self.inner.find_exam(id).await
        }

        async fn list_exams_for_course(&mut self, course_id: i64) -> StoreResult<Vec<Exam>> {
            self.inner.list_exams_for_course(course_id).await
        }

        async fn list_exams_by_instructor(&mut self, instructor_id: i64) -> StoreResult<Vec<Exam>> {
            self.inner.list_exams_by_instructor(instructor_id).await
        }

        async fn insert_exam(&mut self, params: CreateExam) -> StoreResult<Exam> {
            self.inner.insert_exam(params).await
        }

        async fn update_exam(&mut self, exam: &Exam) -> StoreResult<()> {
            self.inner.update_exam(exam).await
        }

        async fn list_questions(&mut self, exam_id: i64) -> StoreResult<Vec<QuestionWithOptions>> {
            self.inner.list_questions(exam_id).await
        }

        async fn find_question(&mut self, id: i64) -> StoreResult<Option<QuestionWithOptions>> {
            self.inner.find_question(id).await
        }

        async fn count_questions(&mut self, exam_id: i64) -> StoreResult<i64> {
            self.inner.count_questions(exam_id).await
        }

        async fn insert_question(&mut self, params: CreateQuestion) -> StoreResult<Question> {
            self.inner.insert_question(params).await
        }

        async fn update_question(&mut self, question: &Question) -> StoreResult<()> {
            self.inner.update_question(question).await
        }

        async fn delete_question(&mut self, id: i64) -> StoreResult<bool> {
            self.inner.delete_question(id).await
        }

        async fn insert_option(&mut self, params: CreateOption) -> StoreResult<AnswerOption> {
            self.inner.insert_option(params).await
        }

        async fn delete_options(&mut self, question_id: i64) -> StoreResult<u64> {
            self.inner.delete_options(question_id).await
        }

        async fn find_attempt(
            &mut self,
            exam_id: i64,
            student_id: i64,
        ) -> StoreResult<Option<ExamAttempt>> {
            let current = self.inner.find_attempt(exam_id, student_id).await?;
            Ok(match self.view {
                AttemptView::Missing => None,
                AttemptView::Open => current.map(|attempt| ExamAttempt {
                    end_time: None,
                    submitted_at: None,
                    total_score: 0.0,
                    ..attempt
                }),
            })
        }

        async fn insert_attempt(
            &mut self,
            params: CreateAttempt,
        ) -> StoreResult<Option<ExamAttempt>> {
            self.inner.insert_attempt(params).await
        }

        async fn list_attempts_for_exam(&mut self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>> {
            self.inner.list_attempts_for_exam(exam_id).await
        }

        async fn list_open_attempts(&mut self) -> StoreResult<Vec<ExamAttempt>> {
            self.inner.list_open_attempts().await
        }

        async fn finalize_attempt(
            &mut self,
            attempt_id: i64,
            total_score: f64,
            at: PrimitiveDateTime,
        ) -> StoreResult<bool> {
            self.inner.finalize_attempt(attempt_id, total_score, at).await
        }

        async fn list_answers(&mut self, attempt_id: i64) -> StoreResult<Vec<StudentAnswer>> {
            self.inner.list_answers(attempt_id).await
        }

        async fn delete_answers(&mut self, attempt_id: i64) -> StoreResult<u64> {
            self.inner.delete_answers(attempt_id).await
        }

        async fn insert_answer(&mut self, params: CreateAnswer) -> StoreResult<StudentAnswer> {
            self.inner.insert_answer(params).await
        }

        async fn commit(self: Box<Self>) -> StoreResult<()> {
            self.inner.commit().await
        }
    }
}
