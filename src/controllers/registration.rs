use super::login::normalize_email;
use crate::app::AppContext;
use crate::crypto::hash_password;
use crate::error::{AppResult, ValidationError};
use crate::models::{Gender, Role, User};
use crate::navigation::Route;
use crate::session::now_millis;
use crate::storage::{collections, insert};
use chrono::NaiveDate;
use log::info;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

/// Advisory meter shown while typing; it does not gate registration.
pub fn password_strength(password: &str) -> PasswordStrength {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return PasswordStrength::Weak;
    }
    let letters = password.chars().any(|c| c.is_ascii_alphabetic());
    let digits = password.chars().any(|c| c.is_ascii_digit());
    let symbols = password.chars().any(|c| !c.is_ascii_alphanumeric());
    if letters && digits && symbols {
        PasswordStrength::Strong
    } else {
        PasswordStrength::Medium
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(lower && upper && digit) {
        return Err(ValidationError::PasswordComplexity);
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationForm {
    pub firstname: String,
    pub surname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub dob: Option<NaiveDate>,
    pub gender: Gender,
    pub role: Role,
}

impl RegistrationForm {
    /// Runs the blocking checks in the order the form reports them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing = [
            &self.firstname,
            &self.surname,
            &self.email,
            &self.password,
            &self.confirm_password,
        ]
        .iter()
        .any(|field| field.is_empty());
        if missing || self.dob.is_none() {
            return Err(ValidationError::MissingFields);
        }
        validate_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }

    fn to_user(&self) -> User {
        User {
            id: String::new(),
            firstname: self.firstname.clone(),
            surname: self.surname.clone(),
            email: normalize_email(&self.email),
            password_hash: hash_password(&self.password),
            role: self.role,
            dob: self.dob.map(|dob| dob.format("%d/%m/%Y").to_string()),
            gender: Some(self.gender),
            specialization: None,
            doctor_ids: Vec::new(),
            created_at: now_millis(),
        }
    }
}

/// Validates and stores a new account, then moves to the login screen.
pub async fn register(ctx: &AppContext, form: &RegistrationForm) -> AppResult<String> {
    form.validate()?;
    let id = insert(ctx.store(), collections::USERS, &form.to_user()).await?;
    info!("[Registration] Created {} account {}", form.role, id);
    ctx.navigator().navigate(Route::PatientLogin);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn form() -> RegistrationForm {
        RegistrationForm {
            firstname: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "Analytic1".to_string(),
            confirm_password: "Analytic1".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 12, 10),
            gender: Gender::Female,
            role: Role::Patient,
        }
    }

    #[test]
    fn test_strength_meter() {
        assert_eq!(password_strength("Ab1!"), PasswordStrength::Weak);
        assert_eq!(password_strength("Abcdefg1"), PasswordStrength::Medium);
        assert_eq!(password_strength("Abcdef1!"), PasswordStrength::Strong);
    }

    #[test]
    fn test_checks_run_in_order() {
        let mut f = form();
        f.dob = None;
        f.password = "short".to_string();
        assert_eq!(f.validate(), Err(ValidationError::MissingFields));

        let mut f = form();
        f.password = "short".to_string();
        f.email = "not-an-email".to_string();
        assert_eq!(f.validate(), Err(ValidationError::PasswordTooShort));

        let mut f = form();
        f.confirm_password = "Analytic2".to_string();
        f.email = "not-an-email".to_string();
        assert_eq!(f.validate(), Err(ValidationError::PasswordMismatch));

        let mut f = form();
        f.email = "ada@example".to_string();
        assert_eq!(f.validate(), Err(ValidationError::InvalidEmail));

        assert_eq!(form().validate(), Ok(()));
    }

    #[test]
    fn test_password_complexity() {
        for weak in ["alllowercase1", "ALLUPPERCASE1", "NoDigitsHere"] {
            assert_eq!(validate_password(weak), Err(ValidationError::PasswordComplexity));
        }
        assert_eq!(validate_password("Abc1"), Err(ValidationError::PasswordTooShort));
    }

    #[test]
    fn test_stored_user_shape() {
        let mut f = form();
        f.email = " Ada@Example.com".to_string();
        let user = f.to_user();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.dob.as_deref(), Some("10/12/1990"));
        assert_eq!(user.password_hash, hash_password("Analytic1"));
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["gender"], 0);
        assert_eq!(value["role"], 0);
        assert!(value.get("doctorIds").is_none());
    }
}
