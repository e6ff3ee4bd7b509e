// libs/medical-record-cell/src/services/record.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::services::{AppointmentService, CompletionHook};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::context::RequestContext;

use crate::models::{MedicalRecord, MedicalRecordError, NewMedicalRecord, SaveMedicalRecordRequest, SavedRecord};

pub struct MedicalRecordService {
    supabase: Arc<SupabaseClient>,
    completion_hook: CompletionHook,
}

impl MedicalRecordService {
    pub fn new(config: &AppConfig) -> Self {
        let appointments = AppointmentService::new(config);
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            completion_hook: appointments.completion_hook,
        }
    }

    pub fn with_parts(supabase: Arc<SupabaseClient>, completion_hook: CompletionHook) -> Self {
        Self { supabase, completion_hook }
    }

    /// Save a record, then complete the appointment it documents. The two
    /// steps are not atomic: once the record is stored the save succeeds,
    /// and a failed completion is only reported in the result.
    pub async fn save_record(
        &self,
        ctx: &RequestContext,
        request: SaveMedicalRecordRequest,
    ) -> Result<SavedRecord, MedicalRecordError> {
        let appointment_id = request.appointment_id;

        let record = match request.record_id {
            Some(record_id) => self.update_record_data(ctx, record_id, request).await?,
            None => self.insert_record(ctx, request).await?,
        };

        let completion = match appointment_id {
            Some(appointment_id) => {
                let outcome = self.completion_hook.on_medical_record_saved(ctx, appointment_id).await;
                if !outcome.is_completed() {
                    warn!("Record {} saved but appointment {} was not completed; complete it manually",
                          record.id, appointment_id);
                }
                Some(outcome)
            }
            None => None,
        };

        Ok(SavedRecord { record, completion })
    }

    pub async fn get_record(&self, ctx: &RequestContext, record_id: Uuid) -> Result<MedicalRecord, MedicalRecordError> {
        let rows: Vec<MedicalRecord> = self.supabase.request(
            Method::GET,
            &Self::row_path(ctx, record_id),
            Some(&ctx.auth_token),
            None,
        ).await.map_err(|e| MedicalRecordError::Transport(e.to_string()))?;

        rows.into_iter().next().ok_or(MedicalRecordError::NotFound(record_id))
    }

    /// A patient's records in this clinic, newest first.
    pub async fn list_records(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
        record_type: Option<&str>,
    ) -> Result<Vec<MedicalRecord>, MedicalRecordError> {
        let mut query_parts = vec![
            format!("clinic_id=eq.{}", ctx.clinic_id),
            format!("patient_id=eq.{}", patient_id),
        ];

        if let Some(record_type) = record_type.map(str::trim).filter(|t| !t.is_empty()) {
            query_parts.push(format!("record_type=eq.{}", urlencoding::encode(record_type)));
        }
        query_parts.push("order=date.desc".to_string());

        let path = format!("/rest/v1/medical_records?{}", query_parts.join("&"));
        debug!("Listing medical records: {}", path);

        self.supabase.request(
            Method::GET,
            &path,
            Some(&ctx.auth_token),
            None,
        ).await.map_err(|e| MedicalRecordError::Transport(e.to_string()))
    }

    async fn insert_record(
        &self,
        ctx: &RequestContext,
        request: SaveMedicalRecordRequest,
    ) -> Result<MedicalRecord, MedicalRecordError> {
        let patient_id = request.patient_id
            .ok_or_else(|| MedicalRecordError::Validation("Missing required field: patient_id".to_string()))?;
        let record_type = request.record_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| MedicalRecordError::Validation("Missing required field: record_type".to_string()))?;

        let new_record = NewMedicalRecord {
            clinic_id: ctx.clinic_id,
            patient_id,
            professional_id: ctx.user_id,
            record_type,
            data: request.data,
            date: Utc::now(),
        };

        let body = serde_json::to_value(&new_record)
            .map_err(|e| MedicalRecordError::Transport(format!("Failed to encode record: {}", e)))?;

        let rows: Vec<MedicalRecord> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/medical_records",
            Some(&ctx.auth_token),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| MedicalRecordError::Transport(e.to_string()))?;

        let record = rows.into_iter()
            .next()
            .ok_or_else(|| MedicalRecordError::Transport("Insert returned no record row".to_string()))?;

        info!("Medical record {} ({}) created for patient {}", record.id, record.record_type, record.patient_id);
        Ok(record)
    }

    async fn update_record_data(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
        request: SaveMedicalRecordRequest,
    ) -> Result<MedicalRecord, MedicalRecordError> {
        debug!("Updating data of medical record {}", record_id);

        let rows: Vec<MedicalRecord> = self.supabase.request_with_headers(
            Method::PATCH,
            &Self::row_path(ctx, record_id),
            Some(&ctx.auth_token),
            Some(json!({ "data": request.data })),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| MedicalRecordError::Transport(e.to_string()))?;

        let record = rows.into_iter().next().ok_or(MedicalRecordError::NotFound(record_id))?;

        info!("Medical record {} updated", record.id);
        Ok(record)
    }

    fn row_path(ctx: &RequestContext, record_id: Uuid) -> String {
        format!("/rest/v1/medical_records?id=eq.{}&clinic_id=eq.{}", record_id, ctx.clinic_id)
    }
}
