use super::lookup_user;
use crate::app::AppContext;
use crate::error::{AppResult, ValidationError};
use crate::models::Appointment;
use crate::session::now_millis;
use crate::storage::{collections, fetch_all, insert, Query};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::future::join_all;
use log::info;
use serde_json::json;
use std::collections::BTreeSet;

/// Blocking yes/no prompt.
pub trait Confirm {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Parses a `DD/MM/YYYY` date.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%d/%m/%Y").ok()
}

/// Parses `HH:MM` or `hh:mm AM`/`hh:mm PM`.
pub fn parse_time(time: &str) -> Option<NaiveTime> {
    let time = time.trim();
    let (clock, modifier) = match time.split_once(' ') {
        Some((clock, modifier)) => (clock, Some(modifier.trim().to_ascii_uppercase())),
        None => (time, None),
    };
    let (hours, minutes) = clock.split_once(':')?;
    let mut hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    match modifier.as_deref() {
        Some("PM") if hours < 12 => hours += 12,
        Some("AM") if hours == 12 => hours = 0,
        Some("AM" | "PM") | None => {}
        Some(_) => return None,
    }
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// When an appointment starts. A missing or unreadable time counts as midnight.
pub fn starts_at(appointment: &Appointment) -> Option<NaiveDateTime> {
    let date = parse_date(&appointment.date)?;
    match parse_time(&appointment.time) {
        Some(time) => Some(date.and_time(time)),
        None => date.and_hms_opt(0, 0, 0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    /// Today through the same weekday next week.
    Week,
}

impl DateFilter {
    pub fn admits(self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            DateFilter::All => true,
            DateFilter::Today => date == today,
            DateFilter::Week => date >= today && date <= today + Duration::days(7),
        }
    }
}

/// An appointment with the display name of the other party.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAppointment {
    pub appointment: Appointment,
    pub counterpart: String,
}

impl ScheduledAppointment {
    pub fn status_label(&self) -> &'static str {
        if self.appointment.confirmed {
            "Confirmed"
        } else {
            "Pending"
        }
    }
}

/// Applies `filter` and sorts by start time, unreadable dates last.
pub fn filter_and_sort(
    appointments: &[ScheduledAppointment],
    filter: DateFilter,
    today: NaiveDate,
) -> Vec<ScheduledAppointment> {
    let mut selected: Vec<ScheduledAppointment> = appointments
        .iter()
        .filter(|item| match parse_date(&item.appointment.date) {
            Some(date) => filter.admits(date, today),
            None => filter == DateFilter::All,
        })
        .cloned()
        .collect();
    selected.sort_by_key(|item| starts_at(&item.appointment).unwrap_or(NaiveDateTime::MAX));
    selected
}

/// Dates carrying at least one appointment, for the calendar view.
pub fn marked_dates(appointments: &[ScheduledAppointment]) -> BTreeSet<NaiveDate> {
    appointments
        .iter()
        .filter_map(|item| parse_date(&item.appointment.date))
        .collect()
}

pub fn on_date(appointments: &[ScheduledAppointment], date: NaiveDate) -> Vec<ScheduledAppointment> {
    let same_day: Vec<ScheduledAppointment> = appointments
        .iter()
        .filter(|item| parse_date(&item.appointment.date) == Some(date))
        .cloned()
        .collect();
    filter_and_sort(&same_day, DateFilter::All, date)
}

/// Every appointment of `doctor_id` with its patient's name resolved.
pub async fn doctor_appointments(ctx: &AppContext, doctor_id: &str) -> AppResult<Vec<ScheduledAppointment>> {
    let query = Query::new(collections::APPOINTMENTS).where_eq("doctorid", doctor_id);
    let appointments: Vec<Appointment> = fetch_all(ctx.store(), &query).await?;

    let resolved = appointments.into_iter().map(|appointment| async move {
        let counterpart = if appointment.patient_id.is_empty() {
            "Unknown".to_string()
        } else {
            match lookup_user(ctx.store(), &appointment.patient_id).await {
                Some(patient) => format!("{} {}", patient.firstname, patient.surname),
                None => "Unknown Patient".to_string(),
            }
        };
        ScheduledAppointment {
            appointment,
            counterpart,
        }
    });
    Ok(join_all(resolved).await)
}

/// Appointments of `patient_id` from `today` on, soonest first.
pub async fn upcoming_for_patient(
    ctx: &AppContext,
    patient_id: &str,
    today: NaiveDate,
) -> AppResult<Vec<ScheduledAppointment>> {
    let query = Query::new(collections::APPOINTMENTS).where_eq("patientid", patient_id);
    let appointments: Vec<Appointment> = fetch_all(ctx.store(), &query).await?;

    let mut upcoming = Vec::new();
    for appointment in appointments {
        if !parse_date(&appointment.date).is_some_and(|date| date >= today) {
            continue;
        }
        let counterpart = match lookup_user(ctx.store(), &appointment.doctor_id).await {
            Some(doctor) => format!("Dr. {} {}", doctor.firstname, doctor.surname),
            None => "Unknown Doctor".to_string(),
        };
        upcoming.push(ScheduledAppointment {
            appointment,
            counterpart,
        });
    }
    Ok(filter_and_sort(&upcoming, DateFilter::All, today))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppointmentDraft {
    pub patient_id: String,
    pub date: String,
    pub time: String,
    pub address: String,
    pub reason: String,
    pub confirmed: bool,
}

pub async fn create_appointment(ctx: &AppContext, doctor_id: &str, draft: &AppointmentDraft) -> AppResult<String> {
    let required = [&draft.date, &draft.time, &draft.address, &draft.patient_id];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ValidationError::MissingAppointmentFields.into());
    }
    let appointment = Appointment {
        id: String::new(),
        patient_id: draft.patient_id.clone(),
        doctor_id: doctor_id.to_string(),
        date: draft.date.clone(),
        time: draft.time.clone(),
        address: draft.address.clone(),
        reason: draft.reason.clone(),
        confirmed: draft.confirmed,
        created_at: now_millis(),
    };
    let id = insert(ctx.store(), collections::APPOINTMENTS, &appointment).await?;
    info!("[Appointments] Created {} for patient {}", id, draft.patient_id);
    Ok(id)
}

/// The editable fields of an appointment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentEdit {
    pub address: String,
    pub reason: String,
    pub date: String,
    pub time: String,
    pub confirmed: bool,
}

impl From<&Appointment> for AppointmentEdit {
    fn from(appointment: &Appointment) -> Self {
        AppointmentEdit {
            address: appointment.address.clone(),
            reason: appointment.reason.clone(),
            date: appointment.date.clone(),
            time: appointment.time.clone(),
            confirmed: appointment.confirmed,
        }
    }
}

pub async fn update_appointment(ctx: &AppContext, id: &str, edit: &AppointmentEdit) -> AppResult<()> {
    let fields = json!({
        "address": edit.address,
        "reason": edit.reason,
        "date": edit.date,
        "time": edit.time,
        "status": edit.confirmed,
    });
    ctx.store().update(collections::APPOINTMENTS, id, fields).await?;
    Ok(())
}

/// Deletes after the user confirms. Returns whether the record was removed.
pub async fn delete_appointment(ctx: &AppContext, id: &str, confirm: &dyn Confirm) -> AppResult<bool> {
    if !confirm.confirm(
        "Confirm Delete",
        "Are you sure you want to delete this appointment?",
    ) {
        return Ok(false);
    }
    ctx.store().delete(collections::APPOINTMENTS, id).await?;
    info!("[Appointments] Deleted {}", id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn appt(id: &str, date: &str, time: &str) -> ScheduledAppointment {
        ScheduledAppointment {
            appointment: Appointment {
                id: id.to_string(),
                patient_id: "p1".to_string(),
                doctor_id: "d1".to_string(),
                date: date.to_string(),
                time: time.to_string(),
                address: String::new(),
                reason: String::new(),
                confirmed: false,
                created_at: 0,
            },
            counterpart: "Ada Lovelace".to_string(),
        }
    }

    fn ids(list: &[ScheduledAppointment]) -> Vec<&str> {
        list.iter().map(|item| item.appointment.id.as_str()).collect()
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time("12:15 AM"), NaiveTime::from_hms_opt(0, 15, 0));
        assert_eq!(parse_time("12:15 PM"), NaiveTime::from_hms_opt(12, 15, 0));
        assert_eq!(parse_time("2:05 pm"), NaiveTime::from_hms_opt(14, 5, 0));
        assert_eq!(parse_time("soon"), None);
    }

    #[test]
    fn test_sort_by_date_then_time() {
        let list = vec![
            appt("c", "02/03/2030", "09:00"),
            appt("b", "01/03/2030", "1:00 PM"),
            appt("a", "01/03/2030", "11:00 AM"),
            appt("z", "garbage", "10:00"),
        ];
        let today = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        assert_eq!(ids(&filter_and_sort(&list, DateFilter::All, today)), ["a", "b", "c", "z"]);
    }

    #[test]
    fn test_today_and_week_filters() {
        let today = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        let list = vec![
            appt("yesterday", "28/02/2030", "09:00"),
            appt("today", "01/03/2030", "09:00"),
            appt("in7", "08/03/2030", "09:00"),
            appt("in8", "09/03/2030", "09:00"),
        ];
        assert_eq!(ids(&filter_and_sort(&list, DateFilter::Today, today)), ["today"]);
        assert_eq!(ids(&filter_and_sort(&list, DateFilter::Week, today)), ["today", "in7"]);
    }

    #[test]
    fn test_calendar_helpers() {
        let list = vec![
            appt("a", "01/03/2030", "15:00"),
            appt("b", "01/03/2030", "08:00"),
            appt("c", "05/03/2030", "09:00"),
        ];
        let day = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        assert_eq!(marked_dates(&list).len(), 2);
        assert_eq!(ids(&on_date(&list, day)), ["b", "a"]);
    }
}
