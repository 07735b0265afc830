use crate::models::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("Malformed document: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Endpoint rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum LocalStorageError {
    #[error("Device storage error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Blocking form errors shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required.")]
    MissingFields,
    #[error("Please enter both email and password.")]
    MissingCredentials,
    #[error("Password must be at least 8 characters long.")]
    PasswordTooShort,
    #[error("Password must include at least 1 uppercase letter, 1 lowercase letter, and 1 number.")]
    PasswordComplexity,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Invalid email format.")]
    InvalidEmail,
    #[error("Please enter a valid email.")]
    EmptyEmail,
    #[error("Please complete all required fields.")]
    MissingAppointmentFields,
    #[error("No readings available for that time window.")]
    NoReadings,
    #[error("Invalid patient ID. Cannot upload.")]
    InvalidPatient,
    #[error("No doctor found with this email.")]
    DoctorNotFound,
    #[error("You are already linked to Dr. {0}.")]
    AlreadyLinked(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("Only {0}s can log in here.")]
    WrongRole(Role),
    #[error("Not signed in")]
    NotSignedIn,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Session is no longer valid")]
    SessionInvalid,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Function(#[from] FunctionError),
    #[error(transparent)]
    Local(#[from] LocalStorageError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A user-facing notice: a title and one line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Alert {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl AppError {
    /// Validation and authentication failures surface to the user; backend
    /// failures and forced logouts do not.
    pub fn alert(&self) -> Option<Alert> {
        match self {
            AppError::Validation(ValidationError::AlreadyLinked(_)) => {
                Some(Alert::new("Already Linked", self.to_string()))
            }
            AppError::Validation(ValidationError::NoReadings) => {
                Some(Alert::new("No Data", self.to_string()))
            }
            AppError::Validation(ValidationError::MissingAppointmentFields) => {
                Some(Alert::new("Missing Fields", self.to_string()))
            }
            AppError::Validation(_) => Some(Alert::new("Error", self.to_string())),
            AppError::Auth(_) => Some(Alert::new("Login Failed", self.to_string())),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
