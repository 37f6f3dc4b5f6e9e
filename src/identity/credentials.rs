use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::profile::Profile;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Local, pre-network input failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Email is required")]
    EmptyEmail,
    #[error("Password is required")]
    EmptyPassword,
    #[error("'{0}' is not a valid email address")]
    MalformedEmail(String),
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("User id is required")]
    EmptyUserId,
    #[error("Unknown software background '{0}' (expected python-ros, cpp-low-level or data-science-ml)")]
    UnknownSoftwareBackground(String),
    #[error("Unknown hardware experience '{0}' (expected beginner, intermediate-jetson or expert-fullstack)")]
    UnknownHardwareExperience(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyEmail => "empty_email",
            ValidationError::EmptyPassword => "empty_password",
            ValidationError::MalformedEmail(_) => "malformed_email",
            ValidationError::PasswordTooShort => "password_too_short",
            ValidationError::EmptyUserId => "empty_user_id",
            ValidationError::UnknownSoftwareBackground(_) => "unknown_software_background",
            ValidationError::UnknownHardwareExperience(_) => "unknown_hardware_experience",
        }
    }
}

/// Email/password pair as sent to the login and signup endpoints.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new<S: Into<String>>(email: S, password: S) -> Self {
        Self { email: email.into().trim().to_string(), password: password.into() }
    }

    /// Login only requires both fields to be present.
    pub fn validate_for_login(&self) -> Result<(), ValidationError> {
        if self.email.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(())
    }

    /// Signup requires a well-formed email and a password of at least six characters.
    pub fn validate_for_signup(&self) -> Result<(), ValidationError> {
        self.validate_for_login()?;
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::MalformedEmail(self.email.clone()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        Ok(())
    }
}

/// Everything the signup form collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupForm {
    pub credentials: Credentials,
    pub profile: Profile,
}

impl SignupForm {
    pub fn new(credentials: Credentials, profile: Profile) -> Self {
        Self { credentials, profile }
    }

    /// Builds a form from raw field values, as submitted by a UI.
    pub fn parse(email: &str, password: &str, software: &str, hardware: &str) -> Result<Self, ValidationError> {
        let form = Self {
            credentials: Credentials::new(email, password),
            profile: Profile::parse(software, hardware)?,
        };
        form.validate()?;
        Ok(form)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.credentials.validate_for_signup()
    }
}

pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::EmptyUserId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_needs_both_fields() {
        assert_eq!(Credentials::new("", "secret").validate_for_login(), Err(ValidationError::EmptyEmail));
        assert_eq!(Credentials::new("  ", "secret").validate_for_login(), Err(ValidationError::EmptyEmail));
        assert_eq!(Credentials::new("a@b.com", "").validate_for_login(), Err(ValidationError::EmptyPassword));
        // login does not check shape or length
        assert_eq!(Credentials::new("not-an-email", "x").validate_for_login(), Ok(()));
    }

    #[test]
    fn signup_checks_email_shape_and_password_length() {
        assert_eq!(Credentials::new("a@b.com", "secret").validate_for_signup(), Ok(()));
        assert_eq!(
            Credentials::new("a@b", "secret").validate_for_signup(),
            Err(ValidationError::MalformedEmail("a@b".into()))
        );
        assert_eq!(
            Credentials::new("a b@c.com", "secret").validate_for_signup(),
            Err(ValidationError::MalformedEmail("a b@c.com".into()))
        );
        assert_eq!(Credentials::new("a@b.com", "12345").validate_for_signup(), Err(ValidationError::PasswordTooShort));
    }

    #[test]
    fn signup_form_parses_enumerations() {
        let form = SignupForm::parse("new@user.io", "hunter22", "cpp-low-level", "beginner").unwrap();
        assert_eq!(form.credentials.email, "new@user.io");
        assert_eq!(form.profile.software_background.as_str(), "cpp-low-level");
        let err = SignupForm::parse("new@user.io", "hunter22", "cobol", "beginner").unwrap_err();
        assert_eq!(err.code(), "unknown_software_background");
    }

    #[test]
    fn debug_never_prints_the_password() {
        let dbg = format!("{:?}", Credentials::new("a@b.com", "topsecret"));
        assert!(dbg.contains("a@b.com"));
        assert!(!dbg.contains("topsecret"));
    }

    #[test]
    fn user_id_must_not_be_blank() {
        assert_eq!(validate_user_id(" "), Err(ValidationError::EmptyUserId));
        assert_eq!(validate_user_id("u1"), Ok(()));
    }
}
