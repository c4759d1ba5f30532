use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{Department, Enrollment, User};
use crate::services::grading::GradeBreakdown;
use crate::services::presentation::CourseView;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct DepartmentCreate {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub(crate) name: String,
    #[validate(length(min = 1, max = 20, message = "code must be 1-20 characters"))]
    pub(crate) code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, max = 20, message = "code must be 1-20 characters"))]
    pub(crate) code: String,
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub(crate) name: String,
    pub(crate) department_id: i64,
    pub(crate) instructor_id: i64,
}

/// Body of `POST /admin/assignments`, discriminated by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AssignmentCreate {
    StudentCourse { student_id: i64, course_id: i64 },
    InstructorCourse { instructor_id: i64, course_id: i64 },
}

#[derive(Debug, Serialize)]
pub(crate) struct DepartmentsResponse {
    pub(crate) departments: Vec<Department>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DepartmentResponse {
    pub(crate) department: Department,
}

#[derive(Debug, Serialize)]
pub(crate) struct CoursesResponse {
    pub(crate) courses: Vec<CourseView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseCreated {
    pub(crate) course: CourseView,
    pub(crate) total_courses: usize,
    pub(crate) warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseRoster {
    pub(crate) course: CourseView,
    pub(crate) students: Vec<User>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EnrollmentCreated {
    pub(crate) assignment: Enrollment,
    pub(crate) student_course_count: usize,
    pub(crate) warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InstructorAssigned {
    pub(crate) course: CourseView,
    pub(crate) instructor_course_count: usize,
    pub(crate) warning: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum AssignmentCreated {
    Enrollment(EnrollmentCreated),
    Instructor(InstructorAssigned),
}

#[derive(Debug, Serialize)]
pub(crate) struct RemovalResponse {
    pub(crate) message: String,
    pub(crate) remaining: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentsResponse {
    pub(crate) assignments: Vec<Enrollment>,
}

/// `grade` stays null until the student has a finalized attempt in the course.
#[derive(Debug, Serialize)]
pub(crate) struct CourseGradeResponse {
    pub(crate) course: CourseView,
    pub(crate) grade: Option<GradeBreakdown>,
}
