// libs/appointment-cell/src/services/repository.rs
use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::context::RequestContext;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
    CreatedAppointment, NewAppointment, StatusChange,
};
use crate::services::query::AppointmentFilter;
use crate::services::store::AppointmentStore;

/// Owns appointment records: validation on the way in, clinic-scoped
/// persistence, and the role check for deletes.
pub struct AppointmentRepository {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentRepository {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn AppointmentStore> {
        Arc::clone(&self.store)
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: CreateAppointmentRequest,
    ) -> Result<CreatedAppointment, AppointmentError> {
        if let Some(requested) = request.status.as_ref() {
            if requested.as_str() != Some(AppointmentStatus::Scheduled.as_str()) {
                debug!("Ignoring requested status {} on creation", requested);
            }
        }

        let new_appointment = validate_create_request(ctx, request)?;
        let appointment = self.store.insert(ctx, new_appointment).await?;

        info!("Appointment {} created for patient {} on {} {}-{}",
              appointment.id, appointment.patient_id, appointment.date,
              appointment.start_time, appointment.end_time);

        let room_overlaps = self.find_room_overlaps(ctx, &appointment).await;

        Ok(CreatedAppointment {
            appointment,
            room_overlaps,
        })
    }

    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .fetch(ctx, id)
            .await?
            .ok_or(AppointmentError::NotFound(id))
    }

    /// Write a status without consulting any transition policy. Writing the
    /// status the appointment already has is a no-op.
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<StatusChange, AppointmentError> {
        let current = self.get(ctx, id).await?;
        self.write_status(ctx, current, status).await
    }

    /// Same as `update_status` for a row the caller has already loaded.
    pub async fn write_status(
        &self,
        ctx: &RequestContext,
        current: Appointment,
        status: AppointmentStatus,
    ) -> Result<StatusChange, AppointmentError> {
        let id = current.id;
        let previous = current.status;

        if previous == status {
            debug!("Appointment {} already {}, nothing to write", id, status);
            return Ok(StatusChange {
                appointment: current,
                previous,
                changed: false,
            });
        }

        let appointment = self.store
            .set_status(ctx, id, status)
            .await?
            .ok_or(AppointmentError::NotFound(id))?;

        info!("Appointment {} status {} -> {}", id, previous, status);

        Ok(StatusChange {
            appointment,
            previous,
            changed: true,
        })
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), AppointmentError> {
        if !ctx.role.is_privileged() {
            warn!("User {} with role {} attempted to delete appointment {}", ctx.user_id, ctx.role, id);
            return Err(AppointmentError::Unauthorized(
                "Only clinic admins or owners can delete appointments".to_string(),
            ));
        }

        if !self.store.delete(ctx, id).await? {
            return Err(AppointmentError::NotFound(id));
        }

        info!("Appointment {} deleted by {}", id, ctx.user_id);
        Ok(())
    }

    /// Double booking is allowed; this only reports it.
    async fn find_room_overlaps(&self, ctx: &RequestContext, appointment: &Appointment) -> Vec<Uuid> {
        let room = match appointment.room.as_deref() {
            Some(room) if !room.trim().is_empty() => room,
            _ => return Vec::new(),
        };

        let same_room = match self.store.list(ctx, &AppointmentFilter::room_day(room, appointment.date)).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Room overlap check failed for appointment {}: {}", appointment.id, e);
                return Vec::new();
            }
        };

        let overlaps: Vec<Uuid> = same_room
            .iter()
            .filter(|other| other.id != appointment.id && other.overlaps(appointment))
            .map(|other| other.id)
            .collect();

        if !overlaps.is_empty() {
            warn!("Appointment {} shares room {} on {} with {} overlapping appointment(s)",
                  appointment.id, room, appointment.date, overlaps.len());
        }

        overlaps
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppointmentError> {
    value.ok_or_else(|| AppointmentError::Validation(format!("Missing required field: {}", field)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts `HH:MM` (what the form's time input sends) or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str, field: &str) -> Result<NaiveTime, AppointmentError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| AppointmentError::Validation(format!("Invalid time for {}: {}", field, value)))
}

pub fn validate_create_request(
    ctx: &RequestContext,
    request: CreateAppointmentRequest,
) -> Result<NewAppointment, AppointmentError> {
    let patient_id = required(request.patient_id, "patient_id")?;
    let professional_id = required(request.professional_id, "professional_id")?;
    let date = required(request.date, "date")?;
    let start_raw = required(non_blank(request.start_time), "start_time")?;
    let end_raw = required(non_blank(request.end_time), "end_time")?;

    let start_time = parse_time_of_day(&start_raw, "start_time")?;
    let end_time = parse_time_of_day(&end_raw, "end_time")?;

    if start_time >= end_time {
        return Err(AppointmentError::Validation(format!(
            "start_time ({}) must be before end_time ({})",
            start_time, end_time
        )));
    }

    if let Some(price) = request.price {
        if !price.is_finite() || price < 0.0 {
            return Err(AppointmentError::Validation(
                "price must be a non-negative amount".to_string(),
            ));
        }
    }

    Ok(NewAppointment {
        clinic_id: ctx.clinic_id,
        patient_id,
        professional_id,
        appointment_type: request.appointment_type.unwrap_or_default(),
        date,
        start_time,
        end_time,
        room: non_blank(request.room),
        price: request.price,
        notes: non_blank(request.notes),
        status: AppointmentStatus::Scheduled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::context::StaffRole;
    use crate::models::AppointmentType;

    fn ctx() -> RequestContext {
        RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), StaffRole::Receptionist, "token")
    }

    fn complete_request() -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: Some(Uuid::new_v4()),
            professional_id: Some(Uuid::new_v4()),
            appointment_type: Some(AppointmentType::Visual),
            date: Some("2024-06-01".parse().unwrap()),
            start_time: Some("09:00".to_string()),
            end_time: Some("09:30".to_string()),
            room: Some("2".to_string()),
            price: Some(180.0),
            notes: Some("".to_string()),
            status: Some(serde_json::json!("completed")),
        }
    }

    #[test]
    fn test_validation_forces_scheduled_and_scopes_clinic() {
        let ctx = ctx();
        let new_appointment = validate_create_request(&ctx, complete_request()).unwrap();

        assert_eq!(new_appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(new_appointment.clinic_id, ctx.clinic_id);
        assert_eq!(new_appointment.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(new_appointment.notes, None);
    }

    #[test]
    fn test_each_required_field_is_named() {
        let ctx = ctx();
        let cases: [(&str, fn(&mut CreateAppointmentRequest)); 5] = [
            ("patient_id", |r| r.patient_id = None),
            ("professional_id", |r| r.professional_id = None),
            ("date", |r| r.date = None),
            ("start_time", |r| r.start_time = Some("  ".to_string())),
            ("end_time", |r| r.end_time = None),
        ];

        for (field, clear) in cases {
            let mut request = complete_request();
            clear(&mut request);
            let error = validate_create_request(&ctx, request).unwrap_err();
            assert_matches!(&error, AppointmentError::Validation(msg) if msg.contains(field));
        }
    }

    #[test]
    fn test_time_window_and_price_rules() {
        let ctx = ctx();

        let mut request = complete_request();
        request.end_time = Some("09:00".to_string());
        assert_matches!(validate_create_request(&ctx, request), Err(AppointmentError::Validation(_)));

        let mut request = complete_request();
        request.price = Some(-1.0);
        assert_matches!(validate_create_request(&ctx, request), Err(AppointmentError::Validation(_)));

        let mut request = complete_request();
        request.start_time = Some("9h".to_string());
        assert_matches!(validate_create_request(&ctx, request), Err(AppointmentError::Validation(_)));
    }

    #[test]
    fn test_unrecognised_requested_status_is_ignored() {
        let mut request = complete_request();
        request.status = Some(serde_json::json!("pending"));
        let new_appointment = validate_create_request(&ctx(), request).unwrap();
        assert_eq!(new_appointment.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_type_defaults_to_general() {
        let mut request = complete_request();
        request.appointment_type = None;
        let new_appointment = validate_create_request(&ctx(), request).unwrap();
        assert_eq!(new_appointment.appointment_type, AppointmentType::General);
    }

    #[test]
    fn test_parse_time_with_seconds() {
        assert_eq!(
            parse_time_of_day("17:45:30", "end_time").unwrap(),
            NaiveTime::from_hms_opt(17, 45, 30).unwrap()
        );
    }
}
