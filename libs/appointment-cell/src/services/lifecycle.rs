// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::context::RequestContext;

use crate::models::{AppointmentError, AppointmentStatus, StatusChange};
use crate::services::repository::AppointmentRepository;

/// How strictly status changes are checked.
///
/// `Permissive` lets any status be assigned directly, which is what the
/// clinic front desk has always been able to do. `Strict` only allows the
/// edges of the appointment workflow and treats completed, cancelled and
/// no-show as terminal unless the appointment is explicitly reset to
/// scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        if config.strict_status_transitions {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    /// Workflow edges, not counting the reset to scheduled.
    pub fn workflow_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match from {
            Scheduled => &[Confirmed, Cancelled, NoShow, InProgress],
            Confirmed => &[InProgress, Cancelled, NoShow],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        match self {
            TransitionPolicy::Permissive => false,
            TransitionPolicy::Strict => Self::workflow_transitions(status).is_empty(),
        }
    }

    pub fn allows(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        if from == to || to == AppointmentStatus::Scheduled {
            return true;
        }
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => Self::workflow_transitions(from).contains(&to),
        }
    }

    pub fn valid_transitions(&self, from: AppointmentStatus) -> Vec<AppointmentStatus> {
        AppointmentStatus::ALL
            .into_iter()
            .filter(|to| *to != from && self.allows(from, *to))
            .collect()
    }
}

/// Status state machine on top of the repository.
pub struct AppointmentLifecycleService {
    repository: Arc<AppointmentRepository>,
    policy: TransitionPolicy,
}

impl AppointmentLifecycleService {
    pub fn new(repository: Arc<AppointmentRepository>, policy: TransitionPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.policy.allows(current_status, new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Move an appointment to `new_status`. Repeating the current status
    /// succeeds without a write. Store failures are returned as-is; nothing
    /// is retried.
    pub async fn transition(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<StatusChange, AppointmentError> {
        let current = self.repository.get(ctx, appointment_id).await?;
        self.validate_status_transition(current.status, new_status)?;

        let change = self.repository.write_status(ctx, current, new_status).await?;

        if change.changed && new_status == AppointmentStatus::Scheduled {
            info!("Appointment {} reset to scheduled from {}", appointment_id, change.previous);
        }

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_permissive_policy_allows_everything() {
        let policy = TransitionPolicy::Permissive;
        for from in AppointmentStatus::ALL {
            for to in AppointmentStatus::ALL {
                assert!(policy.allows(from, to), "{} -> {} should be allowed", from, to);
            }
            assert!(!policy.is_terminal(from));
        }
    }

    #[test]
    fn test_strict_policy_edges() {
        let policy = TransitionPolicy::Strict;

        assert!(policy.allows(Scheduled, Confirmed));
        assert!(policy.allows(Scheduled, InProgress));
        assert!(policy.allows(Confirmed, NoShow));
        assert!(policy.allows(InProgress, Completed));
        assert!(!policy.allows(Scheduled, Completed));
        assert!(!policy.allows(Confirmed, Completed));
        assert!(!policy.allows(Completed, Confirmed));
        assert!(!policy.allows(Cancelled, InProgress));
    }

    #[test]
    fn test_strict_policy_allows_reopen_and_repeat() {
        let policy = TransitionPolicy::Strict;

        for terminal in [Completed, Cancelled, NoShow] {
            assert!(policy.is_terminal(terminal));
            assert!(policy.allows(terminal, Scheduled));
            assert!(policy.allows(terminal, terminal));
            assert_eq!(policy.valid_transitions(terminal), vec![Scheduled]);
        }
    }

    #[test]
    fn test_valid_transitions_listing() {
        assert_eq!(
            TransitionPolicy::Strict.valid_transitions(InProgress),
            vec![Scheduled, Completed, Cancelled]
        );
        assert_eq!(TransitionPolicy::Permissive.valid_transitions(Completed).len(), 5);
    }
}
