//! Request body validation.
//!
//! Runs before any core call. The core re-checks what it relies on
//! (non-empty fields), but length and format rules live only here.

use regex_lite::Regex;
use std::sync::OnceLock;

use crate::error::{CoreError, CoreResult};
use crate::types::{LoginPayload, PostDraft, PostPatch, RegistrationPayload, UserPatch};

const NAME_LEN: (usize, usize) = (3, 15);
const PASSWORD_LEN: (usize, usize) = (8, 20);

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

fn invalid(message: String) -> CoreError {
    CoreError::InvalidInput(message)
}

fn required(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("\"{field}\" is not allowed to be empty")));
    }
    Ok(())
}

fn length(field: &str, value: &str, (min, max): (usize, usize)) -> CoreResult<()> {
    required(field, value)?;
    let len = value.chars().count();
    if len < min {
        return Err(invalid(format!("\"{field}\" length must be at least {min} characters long")));
    }
    if len > max {
        return Err(invalid(format!(
            "\"{field}\" length must be less than or equal to {max} characters long"
        )));
    }
    Ok(())
}

fn email(value: &str) -> CoreResult<()> {
    required("email", value)?;
    let email_ok = email_regex().map_or(true, |re| re.is_match(value.trim()));
    if !email_ok {
        return Err(invalid("\"email\" must be a valid email".to_string()));
    }
    Ok(())
}

/// Names 3–15 characters, a valid email, password 8–20 characters.
pub fn validate_registration(payload: &RegistrationPayload) -> CoreResult<()> {
    length("firstName", &payload.first_name, NAME_LEN)?;
    length("lastName", &payload.last_name, NAME_LEN)?;
    email(&payload.email)?;
    length("password", &payload.password, PASSWORD_LEN)
}

/// The registration rules, applied to each field the patch carries.
pub fn validate_user_patch(patch: &UserPatch) -> CoreResult<()> {
    if let Some(first_name) = &patch.first_name {
        length("firstName", first_name, NAME_LEN)?;
    }
    if let Some(last_name) = &patch.last_name {
        length("lastName", last_name, NAME_LEN)?;
    }
    if let Some(address) = &patch.email {
        email(address)?;
    }
    if let Some(password) = &patch.password {
        length("password", password, PASSWORD_LEN)?;
    }
    Ok(())
}

/// Both fields present and non-empty.
pub fn validate_login(payload: &LoginPayload) -> CoreResult<()> {
    required("email", &payload.email)?;
    required("password", &payload.password)
}

/// Title, description and body present and non-empty.
pub fn validate_draft(draft: &PostDraft) -> CoreResult<()> {
    required("title", &draft.title)?;
    required("description", &draft.description)?;
    required("body", &draft.body)
}

/// Description and body, when present, non-empty. A blank image is allowed
/// and resets the cover to the default.
pub fn validate_post_patch(patch: &PostPatch) -> CoreResult<()> {
    if let Some(description) = &patch.description {
        required("description", description)?;
    }
    if let Some(body) = &patch.body {
        required("body", body)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registration(first: &str, email: &str, password: &str) -> RegistrationPayload {
        RegistrationPayload {
            first_name: first.to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_valid_registration_passes() {
        assert!(validate_registration(&registration("Ada", "ada@x.com", "analytical1")).is_ok());
    }

    #[test]
    fn test_name_length_bounds() {
        let err = validate_registration(&registration("Al", "ada@x.com", "analytical1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("firstName"));
        assert!(validate_registration(&registration("Bartholomew-Jones", "a@x.com", "analytical1")).is_err());
    }

    #[test]
    fn test_bad_email_rejected() {
        assert!(validate_registration(&registration("Ada", "not-an-email", "analytical1")).is_err());
        assert!(validate_registration(&registration("Ada", "a b@x.com", "analytical1")).is_err());
    }

    #[test]
    fn test_password_length_bounds() {
        assert!(validate_registration(&registration("Ada", "ada@x.com", "short")).is_err());
        assert!(validate_registration(&registration("Ada", "ada@x.com", &"p".repeat(21))).is_err());
    }

    #[test]
    fn test_login_requires_both_fields() {
        let payload = LoginPayload {
            email: "ada@x.com".to_string(),
            password: String::new(),
        };
        assert!(validate_login(&payload).is_err());
    }

    #[test]
    fn test_user_patch_checks_present_fields() {
        let rename = UserPatch {
            last_name: Some("Byron".to_string()),
            ..Default::default()
        };
        assert!(validate_user_patch(&rename).is_ok());

        let weak = UserPatch {
            password: Some("x".to_string()),
            ..Default::default()
        };
        let err = validate_user_patch(&weak).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("password"));

        let bad_email = UserPatch {
            email: Some("bob".to_string()),
            ..Default::default()
        };
        assert!(validate_user_patch(&bad_email).is_err());

        let short_name = UserPatch {
            first_name: Some("Al".to_string()),
            ..Default::default()
        };
        assert!(validate_user_patch(&short_name).is_err());
    }

    #[test]
    fn test_post_patch_rejects_blank_text() {
        let blank_body = PostPatch {
            body: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_post_patch(&blank_body).unwrap_err().kind(), ErrorKind::InvalidInput);

        let reset_image = PostPatch {
            image: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_post_patch(&reset_image).is_ok());
    }
}
