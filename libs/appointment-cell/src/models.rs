// libs/appointment-cell/src/models.rs
use serde::de::{value::StrDeserializer, DeserializeOwned, Error as _, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;
use std::str::FromStr;

use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Half-open overlap check on the same calendar day.
    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.date == other.date
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Statuses that still occupy a slot on the agenda.
    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| AppointmentError::Validation(format!("Unknown appointment status: {}", value)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Pediatric,
    Functional,
    Neuro,
    Visual,
    Trv,
    #[default]
    General,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Pediatric => write!(f, "pediatric"),
            AppointmentType::Functional => write!(f, "functional"),
            AppointmentType::Neuro => write!(f, "neuro"),
            AppointmentType::Visual => write!(f, "visual"),
            AppointmentType::Trv => write!(f, "trv"),
            AppointmentType::General => write!(f, "general"),
        }
    }
}

/// Consumed by revenue reporting elsewhere; carried through untouched here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    #[serde(other)]
    Other,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Payload of the scheduling form. Every field is optional on the wire so
/// that missing values surface as validation errors naming the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub room: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,
    /// Ignored: new appointments always start as `scheduled`. Kept untyped
    /// so an unknown value cannot block the create.
    #[serde(default)]
    pub status: Option<Value>,
}

/// A validated appointment ready to be written to the store.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAppointment {
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAppointment {
    pub appointment: Appointment,
    /// Active appointments sharing the room at an overlapping time. Advisory only.
    pub room_overlaps: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub appointment: Appointment,
    pub previous: AppointmentStatus,
    pub changed: bool,
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Which way the agenda reads: audit/history views want the newest first,
/// the upcoming schedule wants the soonest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgendaOrder {
    #[default]
    MostRecentFirst,
    SoonestFirst,
}

impl AgendaOrder {
    pub fn direction(&self) -> SortDirection {
        match self {
            AgendaOrder::MostRecentFirst => SortDirection::Descending,
            AgendaOrder::SoonestFirst => SortDirection::Ascending,
        }
    }
}

/// Calendar filters. A cleared filter arrives as an empty parameter
/// (`?date=&status=`) and means "no filter".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendaQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub order: Option<AgendaOrder>,
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let inner: StrDeserializer<'_, serde::de::value::Error> = value.into_deserializer();
            T::deserialize(inner).map(Some).map_err(D::Error::custom)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentStats {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub cancelled_appointments: usize,
    pub no_show_appointments: usize,
    /// Percentage of appointments in the range marked `no_show`.
    pub no_show_rate: f64,
}

// ==============================================================================
// LINKAGE MODELS
// ==============================================================================

/// Result of the completion hook. Never an error: the record save that fired
/// the hook has already happened and must not be undone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Completed { previous: AppointmentStatus },
    AlreadyCompleted,
    Failed { reason: String },
}

impl CompletionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionOutcome::Completed { .. } | CompletionOutcome::AlreadyCompleted)
    }
}

// ==============================================================================
// ROSTER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientSearchQuery {
    pub q: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Status transition from {from} to {to} is not allowed")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Record store error: {0}")]
    Transport(String),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::NotFound(_) => AppError::NotFound(error.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(error.to_string()),
            AppointmentError::Transport(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
        }
        assert!("done".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_free_text_type_is_rejected() {
        let parsed: Result<CreateAppointmentRequest, _> = serde_json::from_value(json!({
            "type": "acupuncture"
        }));
        assert!(parsed.is_err());

        let parsed: CreateAppointmentRequest = serde_json::from_value(json!({
            "type": "trv"
        })).unwrap();
        assert_eq!(parsed.appointment_type, Some(AppointmentType::Trv));
    }

    #[test]
    fn test_unknown_requested_status_does_not_block_create_payload() {
        let parsed: CreateAppointmentRequest = serde_json::from_value(json!({
            "patient_id": Uuid::new_v4(),
            "date": "2024-06-01",
            "status": "pending"
        })).unwrap();
        assert_eq!(parsed.status, Some(json!("pending")));

        let parsed: CreateAppointmentRequest = serde_json::from_value(json!({ "status": "" })).unwrap();
        assert_eq!(parsed.status, Some(json!("")));
    }

    fn agenda_query(uri: &str) -> Result<AgendaQuery, axum::extract::rejection::QueryRejection> {
        let uri: axum::http::Uri = uri.parse().unwrap();
        axum::extract::Query::<AgendaQuery>::try_from_uri(&uri).map(|query| query.0)
    }

    #[test]
    fn test_agenda_query_treats_blank_filters_as_absent() {
        let query = agenda_query("/appointments?date=&status=&order=").unwrap();
        assert_eq!(query.date, None);
        assert_eq!(query.status, None);
        assert_eq!(query.order, None);

        let query = agenda_query("/appointments?date=2024-06-01&status=no_show&order=soonest_first").unwrap();
        assert_eq!(query.date, Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert_eq!(query.status, Some(AppointmentStatus::NoShow));
        assert_eq!(query.order, Some(AgendaOrder::SoonestFirst));

        let query = agenda_query("/appointments").unwrap();
        assert_eq!(query.date, None);

        assert!(agenda_query("/appointments?status=done").is_err());
    }

    #[test]
    fn test_appointment_deserializes_store_row() {
        let row = json!({
            "id": Uuid::new_v4(),
            "clinic_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "professional_id": Uuid::new_v4(),
            "type": "neuro",
            "date": "2024-06-01",
            "start_time": "09:00:00",
            "end_time": "09:30:00",
            "room": null,
            "price": null,
            "notes": "first visit",
            "status": "in_progress",
            "payment_status": "partially_paid",
            "created_at": "2024-05-20T12:00:00Z"
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.appointment_type, AppointmentType::Neuro);
        assert_eq!(appointment.status, AppointmentStatus::InProgress);
        assert_eq!(appointment.payment_status, Some(PaymentStatus::Other));
        assert_eq!(appointment.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn test_active_statuses() {
        assert!(AppointmentStatus::Scheduled.is_active());
        assert!(AppointmentStatus::InProgress.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
        assert!(!AppointmentStatus::NoShow.is_active());
    }

    #[test]
    fn test_error_mapping() {
        let id = Uuid::new_v4();
        assert!(matches!(AppError::from(AppointmentError::NotFound(id)), AppError::NotFound(_)));
        assert!(matches!(
            AppError::from(AppointmentError::Unauthorized("delete".into())),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            AppError::from(AppointmentError::Transport("down".into())),
            AppError::ExternalService(_)
        ));
    }
}
