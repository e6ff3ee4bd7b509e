// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::context::resolve_request_context;

use crate::models::{
    AgendaQuery, CompletionOutcome, CreateAppointmentRequest, PatientSearchQuery,
    StatsQuery, UpdateStatusRequest,
};
use crate::services::appointment::AppointmentService;
use crate::services::roster::RosterService;

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let created = service.repository.create(&ctx, request).await?;

    let message = if created.room_overlaps.is_empty() {
        "Appointment scheduled".to_string()
    } else {
        format!(
            "Appointment scheduled; room is already booked by {} overlapping appointment(s)",
            created.room_overlaps.len()
        )
    };

    Ok(Json(json!({
        "success": true,
        "appointment": created.appointment,
        "room_overlaps": created.room_overlaps,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AgendaQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let appointments = service.query.list_operational(&ctx, &query).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let today = Utc::now().date_naive();
    let appointments = service.query.dashboard_preview(&ctx, today).await?;
    let today_count = service.query.count_on(&ctx, today).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "today": today,
        "today_count": today_count
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let stats = service.query.stats(&ctx, query.from, query.to).await?;

    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let appointments = service.query.list_patient_agenda(&ctx, patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "patient_id": patient_id,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let appointment = service.repository.get(&ctx, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    let change = service.lifecycle.transition(&ctx, appointment_id, request.status).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": change.appointment,
        "previous_status": change.previous,
        "changed": change.changed
    })))
}

/// Re-run the completion hook by hand, for when the automatic run after a
/// record save did not go through.
#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    service.repository.get(&ctx, appointment_id).await?;

    match service.completion_hook.on_medical_record_saved(&ctx, appointment_id).await {
        CompletionOutcome::Failed { reason } => {
            warn!("Manual completion of appointment {} failed: {}", appointment_id, reason);
            Err(AppError::ExternalService(reason))
        }
        outcome => Ok(Json(json!({
            "success": true,
            "appointment_id": appointment_id,
            "completion": outcome
        }))),
    }
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let service = AppointmentService::new(&state);

    service.repository.delete(&ctx, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

// ==============================================================================
// ROSTER HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let roster = RosterService::new(&state);

    let patients = roster.search_patients(&ctx, query.q.as_deref().unwrap_or_default()).await?;

    Ok(Json(json!({
        "success": true,
        "patients": patients
    })))
}

#[axum::debug_handler]
pub async fn list_professionals(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = resolve_request_context(&state, &user, auth.token()).await?;
    let roster = RosterService::new(&state);

    let professionals = roster.list_professionals(&ctx).await?;

    Ok(Json(json!({
        "success": true,
        "professionals": professionals
    })))
}
