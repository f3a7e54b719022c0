//! Field rules shared by registration, login and account creation.

use crate::auth::password::MIN_PASSWORD_LEN;
use crate::error::{ApiError, FieldError};

const MIN_NAME_LEN: usize = 2;

/// Trimmed and lowercased, the form emails are stored and looked up in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// A validated sign-up form.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn registration(
    name: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<Registration, ApiError> {
    let name = name.unwrap_or_default().trim();
    let email = normalize_email(email.unwrap_or_default());
    let password = password.unwrap_or_default();

    let mut errors = Vec::new();
    if name.chars().count() < MIN_NAME_LEN {
        errors.push(FieldError {
            field: "name",
            message: "Name must be at least 2 characters",
        });
    }
    if !is_email(&email) {
        errors.push(FieldError {
            field: "email",
            message: "Please enter a valid email",
        });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError {
            field: "password",
            message: "Password must be at least 8 characters",
        });
    }

    if errors.is_empty() {
        Ok(Registration {
            name: name.to_string(),
            email,
            password: password.to_string(),
        })
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Returns the normalized email and the password.
pub fn login(email: Option<&str>, password: Option<&str>) -> Result<(String, String), ApiError> {
    let email = normalize_email(email.unwrap_or_default());
    let password = password.unwrap_or_default();

    let mut errors = Vec::new();
    if !is_email(&email) {
        errors.push(FieldError {
            field: "email",
            message: "Please enter a valid email",
        });
    }
    if password.is_empty() {
        errors.push(FieldError {
            field: "password",
            message: "Password is required",
        });
    }

    if errors.is_empty() {
        Ok((email, password.to_string()))
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// New passwords set through profile or user updates.
pub fn new_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_email() {
        assert!(is_email("ada@example.com"));
        assert!(is_email("a.b+care@mail.example.org"));
        assert!(!is_email("ada@example"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("ada@@example.com"));
        assert!(!is_email("ada smith@example.com"));
        assert!(!is_email("ada@.com"));
    }

    #[test]
    fn test_registration_normalizes() {
        let form = registration(Some("  Ada  "), Some(" Ada@Example.COM "), Some("password1")).unwrap();
        assert_eq!(form.name, "Ada");
        assert_eq!(form.email, "ada@example.com");
    }

    #[test]
    fn test_registration_collects_every_failure() {
        let Err(ApiError::Validation(errors)) = registration(Some("A"), Some("nope"), Some("short"))
        else {
            panic!("expected validation errors");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "email", "password"]);
    }

    #[test]
    fn test_login_requires_password() {
        let Err(ApiError::Validation(errors)) = login(Some("ada@example.com"), None) else {
            panic!("expected validation errors");
        };
        assert_eq!(errors[0].message, "Password is required");
    }
}
