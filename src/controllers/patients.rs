use super::appointments::parse_date;
use super::login::normalize_email;
use super::{lookup_user, matches_search};
use crate::app::AppContext;
use crate::error::{AppResult, StoreError, ValidationError};
use crate::models::{Role, Session, User};
use crate::storage::{collections, fetch, fetch_all, Query};
use chrono::{Datelike, NaiveDate};
use futures_util::future::join_all;
use log::info;
use serde_json::json;

/// Whole years between a `DD/MM/YYYY` birth date and `today`.
pub fn age_on(dob: &str, today: NaiveDate) -> Option<u32> {
    let birth = parse_date(dob)?;
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
}

/// Patients who have linked `doctor_id`.
pub async fn linked_patients(ctx: &AppContext, doctor_id: &str, today: NaiveDate) -> AppResult<Vec<PatientSummary>> {
    let query = Query::new(collections::USERS).where_array_contains("doctorIds", doctor_id);
    let patients: Vec<User> = fetch_all(ctx.store(), &query).await?;
    Ok(patients
        .into_iter()
        .map(|patient| PatientSummary {
            name: format!("{} {}", patient.firstname, patient.surname),
            age: patient.dob.as_deref().and_then(|dob| age_on(dob, today)),
            id: patient.id,
        })
        .collect())
}

pub fn search_patients<'a>(patients: &'a [PatientSummary], term: &str) -> Vec<&'a PatientSummary> {
    patients
        .iter()
        .filter(|patient| matches_search(&patient.name, term))
        .collect()
}

async fn patient_record(ctx: &AppContext, patient_id: &str) -> AppResult<User> {
    fetch::<User>(ctx.store(), collections::USERS, patient_id)
        .await?
        .ok_or_else(|| {
            StoreError::NotFound {
                collection: collections::USERS.to_string(),
                id: patient_id.to_string(),
            }
            .into()
        })
}

/// The doctors a patient has linked. Ids without a user record are skipped.
pub async fn linked_doctors(ctx: &AppContext, patient_id: &str) -> AppResult<Vec<User>> {
    let patient = patient_record(ctx, patient_id).await?;
    let lookups = patient
        .doctor_ids
        .iter()
        .map(|doctor_id| lookup_user(ctx.store(), doctor_id));
    Ok(join_all(lookups).await.into_iter().flatten().collect())
}

/// Links the doctor registered under `email` to the patient.
pub async fn link_doctor(ctx: &AppContext, patient_id: &str, email: &str) -> AppResult<User> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyEmail.into());
    }
    let query = Query::new(collections::USERS)
        .where_eq("email", normalize_email(email))
        .where_eq("role", u8::from(Role::Doctor));
    let doctor = fetch_all::<User>(ctx.store(), &query)
        .await?
        .into_iter()
        .next()
        .ok_or(ValidationError::DoctorNotFound)?;

    let patient = patient_record(ctx, patient_id).await?;
    if patient.doctor_ids.contains(&doctor.id) {
        return Err(ValidationError::AlreadyLinked(doctor.full_name()).into());
    }

    let mut doctor_ids = patient.doctor_ids;
    doctor_ids.push(doctor.id.clone());
    ctx.store()
        .update(collections::USERS, patient_id, json!({ "doctorIds": doctor_ids }))
        .await?;
    info!("[Patients] {} linked to doctor {}", patient_id, doctor.id);
    Ok(doctor)
}

/// Someone the signed-in user can open a chat with.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    pub name: String,
}

/// Doctors see their linked patients; patients see their linked doctors.
pub async fn contacts(ctx: &AppContext, session: &Session, today: NaiveDate) -> AppResult<Vec<Contact>> {
    match session.role {
        Role::Doctor => Ok(linked_patients(ctx, &session.subject_id, today)
            .await?
            .into_iter()
            .map(|patient| Contact {
                id: patient.id,
                name: patient.name,
            })
            .collect()),
        Role::Patient => Ok(linked_doctors(ctx, &session.subject_id)
            .await?
            .into_iter()
            .map(|doctor| Contact {
                name: format!("Dr. {}", doctor.full_name()),
                id: doctor.id,
            })
            .collect()),
    }
}
