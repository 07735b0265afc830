use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role, stored remotely as an integer (patient 0, doctor 1).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Patient,
    Doctor,
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Patient),
            1 => Ok(Role::Doctor),
            other => Err(format!("unknown role {}", other)),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        match role {
            Role::Patient => 0,
            Role::Doctor => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl TryFrom<u8> for Gender {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Gender::Female),
            1 => Ok(Gender::Male),
            2 => Ok(Gender::Other),
            other => Err(format!("unknown gender {}", other)),
        }
    }
}

impl From<Gender> for u8 {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Female => 0,
            Gender::Male => 1,
            Gender::Other => 2,
        }
    }
}

/// A `users` document. `doctor_ids` holds the linked providers of a patient.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub firstname: String,
    pub surname: String,
    pub email: String,
    #[serde(rename = "passhash")]
    pub password_hash: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(rename = "doctorIds", default, skip_serializing_if = "Vec::is_empty")]
    pub doctor_ids: Vec<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname.trim(), self.surname.trim())
    }
}

/// Server-held session record in the `sessions` collection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub token: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<i64>,
}

/// Display fields carried alongside a signed-in session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Profile {
    pub email: String,
    pub firstname: String,
    pub surname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

/// Client-held proof of authentication; the persisted device copy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "id")]
    pub subject_id: String,
    pub token: String,
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<i64>,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Appointment {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "patientid")]
    pub patient_id: String,
    #[serde(rename = "doctorid")]
    pub doctor_id: String,
    /// `DD/MM/YYYY`
    pub date: String,
    /// `HH:MM` or `hh:mm AM`
    pub time: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "status", default)]
    pub confirmed: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "receiverId")]
    pub receiver_id: String,
    #[serde(rename = "messageText")]
    pub text: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
}

/// One device sample. Either value may be absent or non-numeric upstream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Reading {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "userid")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub bpm: Option<f64>,
    #[serde(rename = "O2", default, deserialize_with = "lenient_number")]
    pub o2: Option<f64>,
    pub timestamp: i64,
}

/// Accepts any JSON value; only numbers survive.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// Exported window of readings, stored in `patient_reports`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Report {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "userid")]
    pub user_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "timeRange")]
    pub time_range: String,
    #[serde(default)]
    pub bpm: Vec<f64>,
    #[serde(rename = "O2", default)]
    pub o2: Vec<f64>,
    #[serde(default)]
    pub timestamps: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Notification {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "userid")]
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PatientFile {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "patientId")]
    pub patient_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl PatientFile {
    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}
