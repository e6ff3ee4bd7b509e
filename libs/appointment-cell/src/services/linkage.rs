// libs/appointment-cell/src/services/linkage.rs
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use shared_models::context::RequestContext;

use crate::models::{AppointmentStatus, CompletionOutcome};
use crate::services::repository::AppointmentRepository;

/// Marks an appointment completed once clinical documentation for it is
/// saved. Runs after the record is already persisted, so it reports instead
/// of failing.
pub struct CompletionHook {
    repository: Arc<AppointmentRepository>,
}

impl CompletionHook {
    pub fn new(repository: Arc<AppointmentRepository>) -> Self {
        Self { repository }
    }

    /// Completion ignores the transition policy: documentation for a visit
    /// means the visit happened, whatever the agenda said.
    pub async fn on_medical_record_saved(&self, ctx: &RequestContext, appointment_id: Uuid) -> CompletionOutcome {
        let current = match self.repository.get(ctx, appointment_id).await {
            Ok(appointment) => appointment,
            Err(e) => {
                error!("Completion hook could not load appointment {}: {}", appointment_id, e);
                return CompletionOutcome::Failed { reason: e.to_string() };
            }
        };

        if current.status == AppointmentStatus::Completed {
            info!("Appointment {} already completed", appointment_id);
            return CompletionOutcome::AlreadyCompleted;
        }

        if matches!(current.status, AppointmentStatus::Cancelled | AppointmentStatus::NoShow) {
            warn!("Completing appointment {} that was marked {}", appointment_id, current.status);
        }

        match self.repository.write_status(ctx, current, AppointmentStatus::Completed).await {
            Ok(change) if change.changed => {
                info!("Appointment {} completed after record save (was {})", appointment_id, change.previous);
                CompletionOutcome::Completed { previous: change.previous }
            }
            Ok(_) => CompletionOutcome::AlreadyCompleted,
            Err(e) => {
                error!("Completion hook failed for appointment {}: {}", appointment_id, e);
                CompletionOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}
