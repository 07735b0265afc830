mod common;

use clearconnect::console::Console;
use clearconnect::models::Role;
use clearconnect::storage::{collections, RemoteStore};
use common::{harness, Harness};
use serde_json::json;
use std::io::Cursor;

async fn run_script(h: &Harness, script: &str) -> String {
    let console = Console::new(h.ctx.clone(), Cursor::new(script.as_bytes().to_vec()), Vec::new());
    console.run().await.unwrap();
    String::from_utf8(console.into_output()).unwrap()
}

#[tokio::test]
async fn test_patient_session_script() {
    let h = harness();
    let output = run_script(
        &h,
        "register Ada Lovelace ada@example.com Analytic1 Analytic1 10/12/1990 female\n\
         login patient ada@example.com Analytic1\n\
         whoami\n\
         link nobody@clinic.org\n\
         appointment delete a1\n\
         logout\n\
         whoami\n\
         exit\n",
    )
    .await;

    for expected in [
        "Password strength: Medium",
        "Success: Registration successful!",
        "Login Successful: Welcome, Ada Lovelace!",
        "Ada Lovelace <ada@example.com> (patient)",
        "Error: No doctor found with this email.",
        "Only doctors can do that.",
        "Logged out.",
        "Not signed in.",
        "Goodbye.",
    ] {
        assert!(output.contains(expected), "missing {:?} in:\n{}", expected, output);
    }
    assert_eq!(h.count(collections::SESSIONS).await, 0);
}

#[tokio::test]
async fn test_declined_delete_keeps_appointment() {
    let h = harness();
    h.seed_user("Gregory", "House", "house@clinic.org", "Vicodin1", Role::Doctor).await;
    h.store
        .set(
            collections::APPOINTMENTS,
            "a1",
            json!({"patientid": "p1", "doctorid": "d1", "date": "01/02/2030", "time": "09:00", "address": "Ward 4"}),
        )
        .await
        .unwrap();

    let output = run_script(
        &h,
        "login doctor house@clinic.org Vicodin1\n\
         appointment confirm a1\n\
         appointment confirm missing\n\
         appointment delete a1\n\
         n\n\
         exit\n",
    )
    .await;
    assert!(output.contains("Success: Appointment updated."));
    assert!(output.contains("Appointment not found."));
    let confirmed = h.store.get(collections::APPOINTMENTS, "a1").await.unwrap().unwrap();
    assert_eq!(confirmed.data["status"], json!(true));
    assert_eq!(confirmed.data["address"], json!("Ward 4"));
    assert!(output.contains("Confirm Delete: Are you sure you want to delete this appointment? [y/N]"));
    assert!(output.contains("Cancelled."));
    assert!(h.store.get(collections::APPOINTMENTS, "a1").await.unwrap().is_some());

    let output = run_script(&h, "appointment delete a1\nyes\nexit\n").await;
    assert!(output.contains("Deleted: Appointment deleted."));
    assert!(h.store.get(collections::APPOINTMENTS, "a1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_protected_command_without_session() {
    let h = harness();
    let output = run_script(&h, "inbox\nmetrics 24h\n").await;
    assert_eq!(
        output.matches("Session expired or invalid. Please log in again.").count(),
        2
    );
    assert!(!output.contains("Something went wrong"));
}

#[tokio::test]
async fn test_patient_cannot_reach_another_patients_records() {
    let h = harness();
    h.seed_user("Ada", "Lovelace", "ada@mail.com", "Secret123", Role::Patient).await;
    h.seed_user("Gregory", "House", "house@clinic.org", "Vicodin1", Role::Doctor).await;
    h.store
        .add(
            collections::PATIENT_FILES,
            json!({"patientId": "other", "fileName": "scan.jpg", "fileUrl": "patient_files/other/scan.jpg", "mimeType": "image/jpeg", "timestamp": 1}),
        )
        .await
        .unwrap();

    let output = run_script(
        &h,
        "login patient ada@mail.com Secret123\n\
         files other\n\
         reports other 01/01/2030\n\
         upload other /nonexistent/scan.jpg\n\
         exit\n",
    )
    .await;
    assert_eq!(output.matches("You can only access your own records.").count(), 3);
    assert!(!output.contains("scan.jpg ("));
    assert_eq!(h.count(collections::PATIENT_FILES).await, 1);

    let output = run_script(&h, "logout\nlogin doctor house@clinic.org Vicodin1\nfiles other\nexit\n").await;
    assert!(output.contains("scan.jpg (image)"), "{}", output);
}
