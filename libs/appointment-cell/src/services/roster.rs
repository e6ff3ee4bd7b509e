// libs/appointment-cell/src/services/roster.rs
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::context::RequestContext;

use crate::models::{AppointmentError, RosterEntry};

pub const MIN_SEARCH_CHARS: usize = 2;

/// Patient and professional pickers for the scheduling form.
pub struct RosterService {
    supabase: Arc<SupabaseClient>,
}

impl RosterService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Case-insensitive substring search on patient names within the clinic.
    pub async fn search_patients(&self, ctx: &RequestContext, term: &str) -> Result<Vec<RosterEntry>, AppointmentError> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }

        let path = format!(
            "/rest/v1/patients?clinic_id=eq.{}&full_name=ilike.*{}*&select=id,full_name&order=full_name.asc",
            ctx.clinic_id,
            urlencoding::encode(term)
        );
        debug!("Searching patients: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(&ctx.auth_token), None)
            .await
            .map_err(|e| AppointmentError::Transport(e.to_string()))
    }

    pub async fn list_professionals(&self, ctx: &RequestContext) -> Result<Vec<RosterEntry>, AppointmentError> {
        let path = format!(
            "/rest/v1/profiles?clinic_id=eq.{}&select=id,full_name&order=full_name.asc",
            ctx.clinic_id
        );

        self.supabase
            .request(Method::GET, &path, Some(&ctx.auth_token), None)
            .await
            .map_err(|e| AppointmentError::Transport(e.to_string()))
    }
}
