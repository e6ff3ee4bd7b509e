// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::context::RequestContext;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment, SortDirection};
use crate::services::query::AppointmentFilter;

/// Persistence seam for appointments. Every call is scoped to the clinic in
/// the request context; rows of other clinics are invisible.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, appointment: NewAppointment) -> Result<Appointment, AppointmentError>;

    async fn fetch(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Returns `None` when no row with that id exists in the clinic.
    async fn set_status(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Returns whether a row was removed.
    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, AppointmentError>;

    async fn list(&self, ctx: &RequestContext, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError>;

    /// Number of rows matching the filter. Ordering and the row cap are ignored.
    async fn count(&self, ctx: &RequestContext, filter: &AppointmentFilter) -> Result<usize, AppointmentError>;
}

// ==============================================================================
// SUPABASE (POSTGREST) STORE
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn row_path(ctx: &RequestContext, id: Uuid) -> String {
        format!("/rest/v1/appointments?id=eq.{}&clinic_id=eq.{}", id, ctx.clinic_id)
    }
}

/// Render a filter as PostgREST query parameters, clinic scope first.
pub fn postgrest_query(clinic_id: Uuid, filter: &AppointmentFilter) -> String {
    let mut query_parts = vec![format!("clinic_id=eq.{}", clinic_id)];

    if let Some(date) = filter.date {
        query_parts.push(format!("date=eq.{}", date));
    }
    if let Some(from) = filter.date_from {
        query_parts.push(format!("date=gte.{}", from));
    }
    if let Some(to) = filter.date_to {
        query_parts.push(format!("date=lte.{}", to));
    }
    if let Some(status) = filter.status {
        query_parts.push(format!("status=eq.{}", status));
    }
    if !filter.status_in.is_empty() {
        let statuses: Vec<&str> = filter.status_in.iter().map(|s| s.as_str()).collect();
        query_parts.push(format!("status=in.({})", statuses.join(",")));
    }
    if let Some(patient_id) = filter.patient_id {
        query_parts.push(format!("patient_id=eq.{}", patient_id));
    }
    if let Some(room) = &filter.room {
        query_parts.push(format!("room=eq.{}", urlencoding::encode(room)));
    }
    if !filter.order.is_empty() {
        let order: Vec<String> = filter.order.iter()
            .map(|(key, direction)| {
                let suffix = match direction {
                    SortDirection::Ascending => "asc",
                    SortDirection::Descending => "desc",
                };
                format!("{}.{}", key.column(), suffix)
            })
            .collect();
        query_parts.push(format!("order={}", order.join(",")));
    }
    if let Some(limit) = filter.limit {
        query_parts.push(format!("limit={}", limit));
    }

    query_parts.join("&")
}

fn transport(error: anyhow::Error) -> AppointmentError {
    AppointmentError::Transport(error.to_string())
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, ctx: &RequestContext, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Transport(format!("Failed to encode appointment: {}", e)))?;

        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(&ctx.auth_token),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(transport)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Transport("Insert returned no appointment row".to_string()))
    }

    async fn fetch(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &Self::row_path(ctx, id),
            Some(&ctx.auth_token),
            None,
        ).await.map_err(transport)?;

        Ok(rows.into_iter().next())
    }

    async fn set_status(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &Self::row_path(ctx, id),
            Some(&ctx.auth_token),
            Some(json!({ "status": status })),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(transport)?;

        Ok(rows.into_iter().next())
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, AppointmentError> {
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &Self::row_path(ctx, id),
            Some(&ctx.auth_token),
            None,
            Some(SupabaseClient::return_representation()),
        ).await.map_err(transport)?;

        Ok(!rows.is_empty())
    }

    async fn list(&self, ctx: &RequestContext, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}", postgrest_query(ctx.clinic_id, filter));
        debug!("Listing appointments: {}", path);

        self.supabase.request(
            Method::GET,
            &path,
            Some(&ctx.auth_token),
            None,
        ).await.map_err(transport)
    }

    async fn count(&self, ctx: &RequestContext, filter: &AppointmentFilter) -> Result<usize, AppointmentError> {
        let uncapped = AppointmentFilter {
            order: Vec::new(),
            limit: None,
            ..filter.clone()
        };
        let path = format!("/rest/v1/appointments?{}&select=id", postgrest_query(ctx.clinic_id, &uncapped));
        debug!("Counting appointments: {}", path);

        self.supabase.count_exact(&path, Some(&ctx.auth_token)).await.map_err(transport)
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Process-local store used for development and tests. Applies the same
/// filter semantics as the PostgREST store.
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    rows: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, ctx: &RequestContext, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        let row = Appointment {
            id: Uuid::new_v4(),
            clinic_id: ctx.clinic_id,
            patient_id: appointment.patient_id,
            professional_id: appointment.professional_id,
            appointment_type: appointment.appointment_type,
            date: appointment.date,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            room: appointment.room,
            price: appointment.price,
            notes: appointment.notes,
            status: appointment.status,
            payment_status: None,
            created_at: Some(Utc::now()),
        };

        self.rows.write().await.insert(row.id, row.clone());
        Ok(row)
    }

    async fn fetch(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|row| row.clinic_id == ctx.clinic_id).cloned())
    }

    async fn set_status(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) if row.clinic_id == ctx.clinic_id => {
                row.status = status;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, AppointmentError> {
        let mut rows = self.rows.write().await;
        let in_clinic = rows.get(&id).is_some_and(|row| row.clinic_id == ctx.clinic_id);
        if in_clinic {
            rows.remove(&id);
        }
        Ok(in_clinic)
    }

    async fn list(&self, ctx: &RequestContext, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        Ok(filter.apply(
            rows.values()
                .filter(|row| row.clinic_id == ctx.clinic_id)
                .cloned(),
        ))
    }

    async fn count(&self, ctx: &RequestContext, filter: &AppointmentFilter) -> Result<usize, AppointmentError> {
        let rows = self.rows.read().await;
        Ok(rows.values()
            .filter(|row| row.clinic_id == ctx.clinic_id && filter.matches(row))
            .count())
    }
}
