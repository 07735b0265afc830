use crate::app::AppContext;
use crate::error::{AppResult, ValidationError};
use crate::models::PatientFile;
use crate::session::now_millis;
use crate::storage::{collections, fetch_all, insert, Query};
use log::info;

pub const JPEG: &str = "image/jpeg";
pub const PDF: &str = "application/pdf";

/// A picked file ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub enum Upload {
    Image(Vec<u8>),
    /// A document with its original name, if the picker supplied one.
    Pdf { name: Option<String>, bytes: Vec<u8> },
}

impl Upload {
    /// Stored file name and MIME type, stamped with `now` where no name is given.
    pub fn naming(&self, now: i64) -> (String, &'static str) {
        match self {
            Upload::Image(_) => (format!("image_{}.jpg", now), JPEG),
            Upload::Pdf { name, .. } => match name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => (name.to_string(), PDF),
                _ => (format!("file_{}.pdf", now), PDF),
            },
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Upload::Image(bytes) | Upload::Pdf { bytes, .. } => bytes,
        }
    }
}

pub fn blob_path(patient_id: &str, file_name: &str) -> String {
    format!("patient_files/{}/{}", patient_id, file_name)
}

pub async fn list_files(ctx: &AppContext, patient_id: &str) -> AppResult<Vec<PatientFile>> {
    let query = Query::new(collections::PATIENT_FILES).where_eq("patientId", patient_id);
    Ok(fetch_all(ctx.store(), &query).await?)
}

/// Uploads the blob, then records it against the patient.
pub async fn upload_file(ctx: &AppContext, patient_id: &str, upload: Upload) -> AppResult<PatientFile> {
    let patient_id = patient_id.trim();
    if patient_id.is_empty() {
        return Err(ValidationError::InvalidPatient.into());
    }

    let now = now_millis();
    let (file_name, mime_type) = upload.naming(now);
    let path = blob_path(patient_id, &file_name);
    let file_url = ctx.blobs.upload(&path, upload.into_bytes(), mime_type).await?;

    let mut file = PatientFile {
        id: String::new(),
        patient_id: patient_id.to_string(),
        file_name,
        file_url,
        mime_type: mime_type.to_string(),
        timestamp: now,
    };
    file.id = insert(ctx.store(), collections::PATIENT_FILES, &file).await?;
    info!("[Files] Uploaded {} for patient {}", path, patient_id);
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_naming() {
        assert_eq!(
            Upload::Image(vec![]).naming(42),
            ("image_42.jpg".to_string(), JPEG)
        );
        let named = Upload::Pdf {
            name: Some("results.pdf".to_string()),
            bytes: vec![],
        };
        assert_eq!(named.naming(42), ("results.pdf".to_string(), PDF));
        let unnamed = Upload::Pdf {
            name: Some("  ".to_string()),
            bytes: vec![],
        };
        assert_eq!(unnamed.naming(42), ("file_42.pdf".to_string(), PDF));
    }

    #[test]
    fn test_blob_path() {
        assert_eq!(blob_path("p1", "scan.pdf"), "patient_files/p1/scan.pdf");
    }
}
