pub(crate) mod access;
pub(crate) mod admin;
pub(crate) mod attempts;
pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod grading;
pub(crate) mod presentation;
pub(crate) mod statistics;
