pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod department_head;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod instructor;
pub(crate) mod router;
pub(crate) mod student;
pub(crate) mod validation;
