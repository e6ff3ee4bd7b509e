// libs/medical-record-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use appointment_cell::models::CompletionOutcome;
use shared_models::error::AppError;

/// A clinical note. `data` holds the form fields of whichever record type
/// (anamnesis, evolution, exam report, ...) the professional filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub record_type: String,
    #[serde(default)]
    pub data: Value,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveMedicalRecordRequest {
    /// Present when editing an existing record; only `data` is rewritten.
    pub record_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub record_type: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// The visit this documentation belongs to, if any.
    pub appointment_id: Option<Uuid>,
}

/// Filters for a patient's chart. `record_type` narrows the list to one kind
/// of document (prescriptions, exam files, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordListQuery {
    pub patient_id: Option<Uuid>,
    pub record_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMedicalRecord {
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub record_type: String,
    pub data: Value,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecord {
    pub record: MedicalRecord,
    /// Outcome of completing the linked appointment, when one was given.
    pub completion: Option<CompletionOutcome>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MedicalRecordError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Medical record {0} not found")]
    NotFound(Uuid),

    #[error("Record store error: {0}")]
    Transport(String),
}

impl From<MedicalRecordError> for AppError {
    fn from(error: MedicalRecordError) -> Self {
        match error {
            MedicalRecordError::Validation(msg) => AppError::ValidationError(msg),
            MedicalRecordError::NotFound(_) => AppError::NotFound(error.to_string()),
            MedicalRecordError::Transport(msg) => AppError::ExternalService(msg),
        }
    }
}
