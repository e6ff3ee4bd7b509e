pub mod appointment;
pub mod lifecycle;
pub mod linkage;
pub mod query;
pub mod repository;
pub mod roster;
pub mod store;

pub use appointment::AppointmentService;
pub use lifecycle::{AppointmentLifecycleService, TransitionPolicy};
pub use linkage::CompletionHook;
pub use query::{AgendaQueryService, AppointmentFilter};
pub use repository::AppointmentRepository;
pub use roster::RosterService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
