use validator::{Validate, ValidationErrors};

use crate::api::errors::ApiError;

/// Runs the payload's `validator` rules and reports every failure in one message.
pub(crate) fn validate_payload(payload: &impl Validate) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| ApiError::BadRequest(describe(&errors)))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            failures.iter().map(move |failure| match &failure.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();

    if messages.is_empty() {
        return errors.to_string();
    }
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::UserRole;
    use crate::schemas::user::UserCreate;

    #[test]
    fn collects_field_messages() {
        let payload = UserCreate {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            role: UserRole::Student,
            full_name: None,
        };
        let Err(ApiError::BadRequest(message)) = validate_payload(&payload) else {
            panic!("expected a validation failure");
        };
        assert_eq!(
            message,
            "email must be a valid address; password must be at least 6 characters"
        );
    }

    #[test]
    fn accepts_valid_payloads() {
        let payload = UserCreate {
            email: "ok@uni.test".to_string(),
            password: "123456".to_string(),
            role: UserRole::Instructor,
            full_name: Some("Ok".to_string()),
        };
        assert!(validate_payload(&payload).is_ok());
    }
}
