use crate::app::AppContext;
use crate::crypto::{hash_password, hashes_match};
use crate::error::{Alert, AppError, AppResult, AuthError, FunctionError, ValidationError};
use crate::functions::DoctorLoginRequest;
use crate::models::{Profile, Role, Session, User};
use crate::navigation::Route;
use crate::session::{create_session, SessionTicket};
use crate::storage::{collections, decode_snapshot, Query};
use log::{info, warn};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Lookup form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A completed login: the published session and the greeting to show.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub session: Session,
    pub welcome: Alert,
}

fn require_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    Ok(())
}

/// Patient sign-in: credentials are checked client-side, then a session
/// record is written directly.
pub async fn login_patient(ctx: &AppContext, email: &str, password: &str) -> AppResult<LoginOutcome> {
    require_credentials(email, password)?;

    let query = Query::new(collections::USERS).where_eq("email", normalize_email(email));
    let users: Vec<User> = decode_snapshot(&ctx.store().query(&query).await?);
    let user = users
        .into_iter()
        .next()
        .ok_or_else(|| AuthError::InvalidCredentials(INVALID_CREDENTIALS.to_string()))?;

    if !hashes_match(&user.password_hash, &hash_password(password)) {
        return Err(AuthError::IncorrectPassword.into());
    }
    if user.role != Role::Patient {
        return Err(AuthError::WrongRole(Role::Patient).into());
    }

    let (ticket, record) = create_session(ctx.store(), &ctx.crypto, &user.id, ctx.config.session_ttl).await?;
    let session = Session {
        session_id: ticket.session_id,
        subject_id: user.id.clone(),
        token: ticket.token,
        expires_at: record.expires_at,
        role: Role::Patient,
        profile: Profile {
            email: user.email.clone(),
            firstname: user.firstname.trim().to_string(),
            surname: user.surname.trim().to_string(),
            specialization: None,
            dob: user.dob.clone(),
            gender: user.gender,
        },
    };

    ctx.sessions.login(session.clone());
    ctx.navigator().reset(Route::PatientDashboard);
    Ok(LoginOutcome {
        welcome: Alert::new("Login Successful", format!("Welcome, {}!", user.full_name())),
        session,
    })
}

/// Doctor sign-in goes through the `doctorLogin` endpoint, which verifies
/// the credentials and role and writes the session record itself.
pub async fn login_doctor(ctx: &AppContext, email: &str, password: &str) -> AppResult<LoginOutcome> {
    require_credentials(email, password)?;

    let ticket = SessionTicket::mint(&ctx.crypto)?;
    let request = DoctorLoginRequest {
        email: normalize_email(email),
        password: hash_password(password),
        session_id: ticket.session_id.clone(),
        token: ticket.token.clone(),
    };

    let response = ctx.functions.doctor_login(&request).await.map_err(|e| match e {
        FunctionError::Rejected { status: 401, message } => AuthError::InvalidCredentials(message).into(),
        FunctionError::Rejected { status: 403, .. } => AuthError::WrongRole(Role::Doctor).into(),
        other => AppError::from(other),
    })?;
    let user = response.user;
    if user.role != Role::Doctor {
        // The endpoint already wrote the record; drop it again.
        if let Err(e) = ctx.store().delete(collections::SESSIONS, &ticket.session_id).await {
            warn!("[Login] Failed to remove session {}: {}", ticket.session_id, e);
        }
        return Err(AuthError::WrongRole(Role::Doctor).into());
    }

    info!("[Login] Doctor {} authenticated", user.id);
    let session = Session {
        session_id: ticket.session_id,
        subject_id: user.id,
        token: ticket.token,
        expires_at: response.expires_at,
        role: Role::Doctor,
        profile: Profile {
            email: user.email,
            firstname: user.firstname,
            surname: user.surname,
            specialization: user.specialization,
            dob: None,
            gender: None,
        },
    };

    ctx.sessions.login(session.clone());
    ctx.navigator().reset(Route::DoctorDashboard);
    Ok(LoginOutcome {
        welcome: Alert::new(
            "Login Successful",
            format!("Welcome Dr. {}!", session.profile.firstname),
        ),
        session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Clinic.ORG "), "jane.doe@clinic.org");
    }

    #[test]
    fn test_require_credentials() {
        assert_eq!(
            require_credentials(" ", "x"),
            Err(ValidationError::MissingCredentials)
        );
        assert_eq!(
            require_credentials("a@b.co", ""),
            Err(ValidationError::MissingCredentials)
        );
        assert!(require_credentials("a@b.co", "pw").is_ok());
    }
}
