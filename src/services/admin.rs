//! Administrative maintenance of users, departments, courses and enrollments.
//!
//! Deletions are checked against the headcount floors in [`GuardPolicy`]; creations only
//! warn while a floor is not yet reached.

use crate::core::clock::Clock;
use crate::core::config::GuardPolicy;
use crate::core::security;
use crate::db::models::{Department, Enrollment, User};
use crate::db::types::UserRole;
use crate::repositories::{
    CreateCourse, CreateDepartment, CreateEnrollment, CreateUser, Store, UnitOfWork,
};
use crate::schemas::course::{
    CourseCreate, CourseCreated, DepartmentCreate, EnrollmentCreated, InstructorAssigned,
    RemovalResponse,
};
use crate::schemas::user::{UserCreate, UserCreated, UserDeleted};
use crate::services::errors::{CoreError, CoreResult};
use crate::services::presentation::{self, CourseView};

async fn require_user_with_role(
    uow: &mut dyn UnitOfWork,
    user_id: i64,
    role: UserRole,
) -> CoreResult<User> {
    match uow.find_user(user_id).await? {
        Some(user) if user.role == role => Ok(user),
        _ => Err(CoreError::validation(format!("User {user_id} is not a valid {}", role.as_str()))),
    }
}

fn floor(value: u32) -> i64 {
    i64::from(value)
}

pub(crate) async fn create_user(
    store: &dyn Store,
    clock: &dyn Clock,
    policy: &GuardPolicy,
    payload: &UserCreate,
) -> CoreResult<UserCreated> {
    if payload.role == UserRole::Admin {
        return Err(CoreError::validation(
            "role must be one of student, instructor or department_head",
        ));
    }
    if payload.password.chars().count() < 6 {
        return Err(CoreError::validation("password must be at least 6 characters"));
    }
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(CoreError::validation("email is required"));
    }

    let mut uow = store.begin().await?;
    if uow.find_user_by_email(&email).await?.is_some() {
        return Err(CoreError::conflict("Email is already in use"));
    }

    let hashed_password = security::hash_password(&payload.password)?;
    let full_name =
        payload.full_name.as_deref().map(str::trim).filter(|name| !name.is_empty()).map(String::from);
    let user = uow
        .insert_user(CreateUser {
            email,
            hashed_password,
            role: payload.role,
            full_name,
            created_at: clock.now_utc(),
        })
        .await?;
    let total_students = uow.count_users(UserRole::Student).await?;
    let total_instructors = uow.count_users(UserRole::Instructor).await?;
    uow.commit().await?;

    let mut warnings = Vec::new();
    if user.role == UserRole::Student && total_students < floor(policy.min_students) {
        warnings.push(format!(
            "At least {} students are required (currently {total_students})",
            policy.min_students
        ));
    }
    if user.role == UserRole::Instructor && total_instructors < floor(policy.min_instructors) {
        warnings.push(format!(
            "At least {} instructors are required (currently {total_instructors})",
            policy.min_instructors
        ));
    }
    tracing::info!(user_id = user.id, role = user.role.as_str(), "user created");

    Ok(UserCreated { user, total_students, total_instructors, warnings })
}

pub(crate) async fn list_users(store: &dyn Store, role: Option<UserRole>) -> CoreResult<Vec<User>> {
    let mut uow = store.begin().await?;
    Ok(uow.list_users(role).await?)
}

/// Deletes a non-admin user. A student's enrollments and attempts go with them.
pub(crate) async fn delete_user(
    store: &dyn Store,
    policy: &GuardPolicy,
    user_id: i64,
) -> CoreResult<UserDeleted> {
    let mut uow = store.begin().await?;
    let user =
        uow.find_user(user_id).await?.ok_or_else(|| CoreError::not_found("User not found"))?;

    match user.role {
        UserRole::Admin => {
            return Err(CoreError::guard("admin_protected", "Admin users cannot be deleted"));
        }
        UserRole::Student => {
            let total = uow.count_users(UserRole::Student).await?;
            if total <= floor(policy.min_students) {
                return Err(CoreError::guard(
                    "min_students",
                    format!(
                        "At least {} students are required (currently {total}); user not deleted",
                        policy.min_students
                    ),
                ));
            }
            uow.delete_enrollments_for_student(user.id).await?;
        }
        UserRole::Instructor => {
            let total = uow.count_users(UserRole::Instructor).await?;
            if total <= floor(policy.min_instructors) {
                return Err(CoreError::guard(
                    "min_instructors",
                    format!(
                        "At least {} instructors are required (currently {total}); user not deleted",
                        policy.min_instructors
                    ),
                ));
            }
            let owned = uow.list_courses_by_instructor(user.id).await?.len();
            if owned > 0 {
                return Err(CoreError::guard(
                    "instructor_has_courses",
                    format!("Instructor still teaches {owned} course(s); reassign them first"),
                ));
            }
        }
        UserRole::DepartmentHead => {}
    }

    uow.delete_user(user.id).await?;
    let remaining_count = uow.count_users(user.role).await?;
    uow.commit().await?;
    tracing::info!(user_id = user.id, role = user.role.as_str(), remaining_count, "user deleted");

    Ok(UserDeleted { message: "User deleted".to_string(), remaining_count })
}

pub(crate) async fn create_department(
    store: &dyn Store,
    payload: &DepartmentCreate,
) -> CoreResult<Department> {
    let name = payload.name.trim();
    let code = payload.code.trim();
    if name.is_empty() || code.is_empty() {
        return Err(CoreError::validation("name and code are required"));
    }

    let mut uow = store.begin().await?;
    if uow.find_department_by_code(code).await?.is_some() {
        return Err(CoreError::conflict("Department code is already in use"));
    }
    let department =
        uow.insert_department(CreateDepartment { name: name.into(), code: code.into() }).await?;
    uow.commit().await?;
    tracing::info!(department_id = department.id, code = %department.code, "department created");
    Ok(department)
}

pub(crate) async fn list_departments(store: &dyn Store) -> CoreResult<Vec<Department>> {
    let mut uow = store.begin().await?;
    Ok(uow.list_departments().await?)
}

pub(crate) async fn delete_department(store: &dyn Store, department_id: i64) -> CoreResult<()> {
    let mut uow = store.begin().await?;
    if uow.find_department(department_id).await?.is_none() {
        return Err(CoreError::not_found("Department not found"));
    }
    let courses = uow.list_courses_by_department(department_id).await?.len();
    if courses > 0 {
        return Err(CoreError::guard(
            "department_has_courses",
            format!("Department still has {courses} course(s); delete or move them first"),
        ));
    }
    uow.delete_department(department_id).await?;
    uow.commit().await?;
    tracing::info!(department_id, "department deleted");
    Ok(())
}

pub(crate) async fn create_course(
    store: &dyn Store,
    policy: &GuardPolicy,
    payload: &CourseCreate,
) -> CoreResult<CourseCreated> {
    let code = payload.code.trim();
    let name = payload.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(CoreError::validation("code and name are required"));
    }

    let mut uow = store.begin().await?;
    if uow.find_course_by_code(code).await?.is_some() {
        return Err(CoreError::conflict("Course code is already in use"));
    }
    require_user_with_role(uow.as_mut(), payload.instructor_id, UserRole::Instructor).await?;
    if uow.find_department(payload.department_id).await?.is_none() {
        return Err(CoreError::validation(format!(
            "Department {} does not exist",
            payload.department_id
        )));
    }

    let course = uow
        .insert_course(CreateCourse {
            code: code.into(),
            name: name.into(),
            department_id: payload.department_id,
            instructor_id: payload.instructor_id,
        })
        .await?;
    let total_courses = uow.list_courses().await?.len();
    let course = presentation::course_view(uow.as_mut(), course).await?;
    uow.commit().await?;

    let minimum = policy.min_courses as usize;
    let warning = (total_courses < minimum)
        .then(|| format!("At least {minimum} courses are required (currently {total_courses})"));
    tracing::info!(course_id = course.course.id, total_courses, "course created");

    Ok(CourseCreated { course, total_courses, warning })
}

pub(crate) async fn list_courses(store: &dyn Store) -> CoreResult<Vec<CourseView>> {
    let mut uow = store.begin().await?;
    let courses = uow.list_courses().await?;
    presentation::course_views(uow.as_mut(), courses).await
}

pub(crate) async fn delete_course(
    store: &dyn Store,
    policy: &GuardPolicy,
    course_id: i64,
) -> CoreResult<RemovalResponse> {
    let mut uow = store.begin().await?;
    if uow.find_course(course_id).await?.is_none() {
        return Err(CoreError::not_found("Course not found"));
    }

    let total = uow.list_courses().await?.len();
    if total <= policy.min_courses as usize {
        return Err(CoreError::guard(
            "min_courses",
            format!(
                "At least {} courses are required (currently {total}); course not deleted",
                policy.min_courses
            ),
        ));
    }
    let enrolled = uow.list_enrollments_for_course(course_id).await?.len();
    if enrolled > 0 {
        return Err(CoreError::guard(
            "course_has_enrollments",
            format!("{enrolled} student(s) are enrolled; remove the enrollments first"),
        ));
    }
    let exams = uow.list_exams_for_course(course_id).await?.len();
    if exams > 0 {
        return Err(CoreError::guard(
            "course_has_exams",
            format!("Course still has {exams} exam(s); delete them first"),
        ));
    }

    uow.delete_course(course_id).await?;
    uow.commit().await?;
    tracing::info!(course_id, remaining = total - 1, "course deleted");
    Ok(RemovalResponse { message: "Course deleted".to_string(), remaining: total - 1 })
}

pub(crate) async fn enroll_student(
    store: &dyn Store,
    clock: &dyn Clock,
    policy: &GuardPolicy,
    student_id: i64,
    course_id: i64,
) -> CoreResult<EnrollmentCreated> {
    let mut uow = store.begin().await?;
    require_user_with_role(uow.as_mut(), student_id, UserRole::Student).await?;
    if uow.find_course(course_id).await?.is_none() {
        return Err(CoreError::validation(format!("Course {course_id} does not exist")));
    }
    if uow.find_enrollment_for(student_id, course_id).await?.is_some() {
        return Err(CoreError::conflict("Student is already enrolled in this course"));
    }

    let assignment = uow
        .insert_enrollment(CreateEnrollment {
            student_id,
            course_id,
            enrollment_date: clock.now_utc(),
        })
        .await?;
    let student_course_count = uow.list_enrollments_for_student(student_id).await?.len();
    uow.commit().await?;

    let minimum = policy.min_courses_per_student as usize;
    let warning = (student_course_count < minimum)
        .then(|| format!("Every student should take at least {minimum} courses"));
    tracing::info!(student_id, course_id, student_course_count, "student enrolled");

    Ok(EnrollmentCreated { assignment, student_course_count, warning })
}

pub(crate) async fn assign_instructor(
    store: &dyn Store,
    policy: &GuardPolicy,
    instructor_id: i64,
    course_id: i64,
) -> CoreResult<InstructorAssigned> {
    let mut uow = store.begin().await?;
    require_user_with_role(uow.as_mut(), instructor_id, UserRole::Instructor).await?;
    let course = uow
        .set_course_instructor(course_id, instructor_id)
        .await?
        .ok_or_else(|| CoreError::validation(format!("Course {course_id} does not exist")))?;
    let instructor_course_count = uow.list_courses_by_instructor(instructor_id).await?.len();
    let course = presentation::course_view(uow.as_mut(), course).await?;
    uow.commit().await?;

    let minimum = policy.min_courses_per_instructor as usize;
    let warning = (instructor_course_count < minimum)
        .then(|| format!("Every instructor should teach at least {minimum} courses"));
    tracing::info!(instructor_id, course_id, instructor_course_count, "instructor assigned");

    Ok(InstructorAssigned { course, instructor_course_count, warning })
}

pub(crate) async fn list_enrollments(store: &dyn Store) -> CoreResult<Vec<Enrollment>> {
    let mut uow = store.begin().await?;
    Ok(uow.list_enrollments().await?)
}

pub(crate) async fn delete_enrollment(
    store: &dyn Store,
    policy: &GuardPolicy,
    enrollment_id: i64,
) -> CoreResult<RemovalResponse> {
    let mut uow = store.begin().await?;
    let enrollment = uow
        .find_enrollment(enrollment_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Enrollment not found"))?;

    let count = uow.list_enrollments_for_student(enrollment.student_id).await?.len();
    if count <= policy.min_courses_per_student as usize {
        return Err(CoreError::guard(
            "min_courses_per_student",
            format!(
                "Every student must keep at least {} courses (currently {count}); enrollment not deleted",
                policy.min_courses_per_student
            ),
        ));
    }

    uow.delete_enrollment(enrollment.id).await?;
    uow.commit().await?;
    tracing::info!(enrollment_id, student_id = enrollment.student_id, "enrollment deleted");
    Ok(RemovalResponse { message: "Enrollment deleted".to_string(), remaining: count - 1 })
}
