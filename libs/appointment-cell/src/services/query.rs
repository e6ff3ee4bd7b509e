// libs/appointment-cell/src/services/query.rs
use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_models::context::RequestContext;

use crate::models::{
    AgendaOrder, AgendaQuery, Appointment, AppointmentError, AppointmentStats,
    AppointmentStatus, SortDirection,
};
use crate::services::store::AppointmentStore;

/// Cap on the clinic calendar when no date is selected.
pub const OPERATIONAL_LIMIT: usize = 50;
/// Cap on the recent-history panel of a patient chart.
pub const PATIENT_AGENDA_LIMIT: usize = 10;
/// Cap on the dashboard "next appointments" preview.
pub const DASHBOARD_PREVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Date,
    StartTime,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::StartTime => "start_time",
        }
    }
}

/// A store-agnostic appointment query: equality and range filters, an
/// ordered list of sort keys and an optional row cap. The clinic scope is not
/// part of the filter; stores always take it from the request context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub status_in: Vec<AppointmentStatus>,
    pub patient_id: Option<Uuid>,
    pub room: Option<String>,
    pub order: Vec<(SortKey, SortDirection)>,
    pub limit: Option<usize>,
}

impl AppointmentFilter {
    /// Clinic calendar. Without a date the listing is capped; both sort keys
    /// always share the caller's direction.
    pub fn operational(date: Option<NaiveDate>, status: Option<AppointmentStatus>, order: AgendaOrder) -> Self {
        let direction = order.direction();
        Self {
            date,
            status,
            order: vec![(SortKey::Date, direction), (SortKey::StartTime, direction)],
            limit: if date.is_none() { Some(OPERATIONAL_LIMIT) } else { None },
            ..Default::default()
        }
    }

    pub fn patient_agenda(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            order: vec![
                (SortKey::Date, SortDirection::Descending),
                (SortKey::StartTime, SortDirection::Descending),
            ],
            limit: Some(PATIENT_AGENDA_LIMIT),
            ..Default::default()
        }
    }

    pub fn dashboard_preview(today: NaiveDate) -> Self {
        Self {
            date_from: Some(today),
            status_in: AppointmentStatus::ACTIVE.to_vec(),
            order: vec![
                (SortKey::Date, SortDirection::Ascending),
                (SortKey::StartTime, SortDirection::Ascending),
            ],
            limit: Some(DASHBOARD_PREVIEW_LIMIT),
            ..Default::default()
        }
    }

    /// Every appointment in an inclusive date range, unordered and uncapped.
    pub fn date_range(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            date_from: Some(from),
            date_to: Some(to),
            ..Default::default()
        }
    }

    /// Active appointments in one room on one day.
    pub fn room_day(room: &str, date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            room: Some(room.to_string()),
            status_in: AppointmentStatus::ACTIVE.to_vec(),
            ..Default::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        if self.date.is_some_and(|date| appointment.date != date) {
            return false;
        }
        if self.date_from.is_some_and(|from| appointment.date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| appointment.date > to) {
            return false;
        }
        if self.status.is_some_and(|status| appointment.status != status) {
            return false;
        }
        if !self.status_in.is_empty() && !self.status_in.contains(&appointment.status) {
            return false;
        }
        if self.patient_id.is_some_and(|patient_id| appointment.patient_id != patient_id) {
            return false;
        }
        if let Some(room) = &self.room {
            if appointment.room.as_deref() != Some(room.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn compare(&self, a: &Appointment, b: &Appointment) -> Ordering {
        for (key, direction) in &self.order {
            let ordering = match key {
                SortKey::Date => a.date.cmp(&b.date),
                SortKey::StartTime => a.start_time.cmp(&b.start_time),
            };
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Filter, sort and cap rows in memory, with the same semantics the
    /// record store applies server-side.
    pub fn apply(&self, rows: impl IntoIterator<Item = Appointment>) -> Vec<Appointment> {
        let mut selected: Vec<Appointment> = rows
            .into_iter()
            .filter(|appointment| self.matches(appointment))
            .collect();

        selected.sort_by(|a, b| self.compare(a, b));

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        selected
    }
}

/// Read side of the agenda: calendar, patient chart and dashboard listings.
pub struct AgendaQueryService {
    store: Arc<dyn AppointmentStore>,
}

impl AgendaQueryService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn list_operational(
        &self,
        ctx: &RequestContext,
        query: &AgendaQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let order = query.order.unwrap_or_default();
        debug!("Listing agenda for clinic {} (date {:?}, status {:?}, {:?})",
               ctx.clinic_id, query.date, query.status, order);

        let filter = AppointmentFilter::operational(query.date, query.status, order);
        self.store.list(ctx, &filter).await
    }

    pub async fn list_patient_agenda(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing recent appointments for patient {}", patient_id);
        self.store.list(ctx, &AppointmentFilter::patient_agenda(patient_id)).await
    }

    pub async fn dashboard_preview(
        &self,
        ctx: &RequestContext,
        today: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Loading dashboard preview for clinic {} from {}", ctx.clinic_id, today);
        self.store.list(ctx, &AppointmentFilter::dashboard_preview(today)).await
    }

    pub async fn count_on(&self, ctx: &RequestContext, date: NaiveDate) -> Result<usize, AppointmentError> {
        self.store.count(ctx, &AppointmentFilter::date_range(date, date)).await
    }

    pub async fn stats(
        &self,
        ctx: &RequestContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AppointmentStats, AppointmentError> {
        if from > to {
            return Err(AppointmentError::Validation(
                "Stats range start must not be after its end".to_string(),
            ));
        }

        let range = AppointmentFilter::date_range(from, to);
        let in_status = |status| AppointmentFilter { status: Some(status), ..range.clone() };
        let completed = in_status(AppointmentStatus::Completed);
        let cancelled = in_status(AppointmentStatus::Cancelled);
        let no_show = in_status(AppointmentStatus::NoShow);

        let (total, completed, cancelled, no_show) = tokio::try_join!(
            self.store.count(ctx, &range),
            self.store.count(ctx, &completed),
            self.store.count(ctx, &cancelled),
            self.store.count(ctx, &no_show),
        )?;

        Ok(summarize(from, to, total, completed, cancelled, no_show))
    }
}

fn summarize(
    from: NaiveDate,
    to: NaiveDate,
    total_appointments: usize,
    completed_appointments: usize,
    cancelled_appointments: usize,
    no_show_appointments: usize,
) -> AppointmentStats {
    let no_show_rate = if total_appointments > 0 {
        no_show_appointments as f64 / total_appointments as f64 * 100.0
    } else {
        0.0
    };

    AppointmentStats {
        from,
        to,
        total_appointments,
        completed_appointments,
        cancelled_appointments,
        no_show_appointments,
        no_show_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use crate::models::AppointmentType;

    fn appointment(date: &str, start: &str, status: AppointmentStatus) -> Appointment {
        let start_time = NaiveTime::parse_from_str(start, "%H:%M").unwrap();
        Appointment {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            patient_id: Uuid::nil(),
            professional_id: Uuid::nil(),
            appointment_type: AppointmentType::General,
            date: date.parse().unwrap(),
            start_time,
            end_time: start_time + chrono::Duration::minutes(30),
            room: Some("1".to_string()),
            price: None,
            notes: None,
            status,
            payment_status: None,
            created_at: None,
        }
    }

    #[test]
    fn test_operational_filter_caps_only_without_date() {
        let undated = AppointmentFilter::operational(None, None, AgendaOrder::MostRecentFirst);
        assert_eq!(undated.limit, Some(OPERATIONAL_LIMIT));

        let dated = AppointmentFilter::operational(
            Some("2024-06-01".parse().unwrap()),
            None,
            AgendaOrder::SoonestFirst,
        );
        assert_eq!(dated.limit, None);
        assert_eq!(dated.order, vec![
            (SortKey::Date, SortDirection::Ascending),
            (SortKey::StartTime, SortDirection::Ascending),
        ]);
    }

    #[test]
    fn test_sort_uses_date_then_time_in_same_direction() {
        let rows = vec![
            appointment("2024-06-01", "14:00", AppointmentStatus::Scheduled),
            appointment("2024-06-02", "08:00", AppointmentStatus::Scheduled),
            appointment("2024-06-01", "09:00", AppointmentStatus::Scheduled),
        ];

        let newest_first = AppointmentFilter::operational(None, None, AgendaOrder::MostRecentFirst).apply(rows.clone());
        let keys: Vec<_> = newest_first.iter().map(|a| (a.date.to_string(), a.start_time.to_string())).collect();
        assert_eq!(keys, vec![
            ("2024-06-02".to_string(), "08:00:00".to_string()),
            ("2024-06-01".to_string(), "14:00:00".to_string()),
            ("2024-06-01".to_string(), "09:00:00".to_string()),
        ]);

        let soonest_first = AppointmentFilter::operational(None, None, AgendaOrder::SoonestFirst).apply(rows);
        let keys: Vec<_> = soonest_first.iter().map(|a| (a.date.to_string(), a.start_time.to_string())).collect();
        assert_eq!(keys, vec![
            ("2024-06-01".to_string(), "09:00:00".to_string()),
            ("2024-06-01".to_string(), "14:00:00".to_string()),
            ("2024-06-02".to_string(), "08:00:00".to_string()),
        ]);
    }

    #[test]
    fn test_dashboard_preview_excludes_past_and_inactive() {
        let today: NaiveDate = "2024-06-10".parse().unwrap();
        let rows = vec![
            appointment("2024-06-09", "10:00", AppointmentStatus::Scheduled),
            appointment("2024-06-10", "10:00", AppointmentStatus::Completed),
            appointment("2024-06-10", "11:00", AppointmentStatus::Cancelled),
            appointment("2024-06-11", "08:00", AppointmentStatus::InProgress),
            appointment("2024-06-10", "09:00", AppointmentStatus::Confirmed),
        ];

        let preview = AppointmentFilter::dashboard_preview(today).apply(rows);
        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].status, AppointmentStatus::Confirmed);
        assert_eq!(preview[1].status, AppointmentStatus::InProgress);
    }

    #[test]
    fn test_summarize_no_show_rate() {
        let from: NaiveDate = "2024-06-01".parse().unwrap();
        let to: NaiveDate = "2024-06-30".parse().unwrap();

        let stats = summarize(from, to, 4, 2, 1, 1);
        assert_eq!(stats.total_appointments, 4);
        assert_eq!(stats.completed_appointments, 2);
        assert_eq!(stats.cancelled_appointments, 1);
        assert_eq!(stats.no_show_appointments, 1);
        assert!((stats.no_show_rate - 25.0).abs() < f64::EPSILON);

        assert_eq!(summarize(from, to, 0, 0, 0, 0).no_show_rate, 0.0);
    }
}
