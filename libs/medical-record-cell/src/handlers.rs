// libs/medical-record-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::context::resolve_request_context;

use crate::models::{RecordListQuery, SaveMedicalRecordRequest};
use crate::services::record::MedicalRecordService;

#[axum::debug_handler]
pub async fn save_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveMedicalRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = MedicalRecordService::new(&state);

    let saved = service.save_record(&ctx, request).await?;

    let appointment_completed = saved.completion.as_ref().map(|outcome| outcome.is_completed());

    Ok(Json(json!({
        "success": true,
        "record": saved.record,
        "completion": saved.completion,
        "appointment_completed": appointment_completed
    })))
}

#[axum::debug_handler]
pub async fn get_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = MedicalRecordService::new(&state);

    let record = service.get_record(&ctx, record_id).await?;

    Ok(Json(json!({
        "success": true,
        "record": record
    })))
}

#[axum::debug_handler]
pub async fn list_records(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;

    let patient_id = query.patient_id
        .ok_or_else(|| AppError::ValidationError("Missing required field: patient_id".to_string()))?;

    let service = MedicalRecordService::new(&state);
    let records = service.list_records(&ctx, patient_id, query.record_type.as_deref()).await?;

    Ok(Json(json!({
        "success": true,
        "patient_id": patient_id,
        "records": records,
        "total": records.len()
    })))
}
