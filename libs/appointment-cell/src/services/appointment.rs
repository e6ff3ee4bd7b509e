// libs/appointment-cell/src/services/appointment.rs
use std::sync::Arc;

use tracing::debug;

use shared_config::AppConfig;

use crate::services::lifecycle::{AppointmentLifecycleService, TransitionPolicy};
use crate::services::linkage::CompletionHook;
use crate::services::query::AgendaQueryService;
use crate::services::repository::AppointmentRepository;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};

/// Wires the appointment services over one store.
pub struct AppointmentService {
    pub repository: Arc<AppointmentRepository>,
    pub lifecycle: AppointmentLifecycleService,
    pub query: AgendaQueryService,
    pub completion_hook: CompletionHook,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        let policy = TransitionPolicy::from_config(config);
        debug!("Building appointment services with {:?} transition policy", policy);
        Self::with_store(Arc::new(SupabaseAppointmentStore::new(config)), policy)
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>, policy: TransitionPolicy) -> Self {
        let repository = Arc::new(AppointmentRepository::new(Arc::clone(&store)));

        Self {
            lifecycle: AppointmentLifecycleService::new(Arc::clone(&repository), policy),
            query: AgendaQueryService::new(store),
            completion_hook: CompletionHook::new(Arc::clone(&repository)),
            repository,
        }
    }
}
