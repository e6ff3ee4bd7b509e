use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::context::{RequestContext, StaffRole};
use shared_models::error::AppError;

/// Resolve who the caller is inside the clinic. The clinic and staff role come
/// from the caller's `profiles` row, never from anything the client sends.
pub async fn resolve_request_context(
    config: &AppConfig,
    user: &User,
    auth_token: &str,
) -> Result<RequestContext, AppError> {
    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

    let supabase = SupabaseClient::new(config);
    let profile = supabase
        .get_staff_profile(&user.id, auth_token)
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?
        .ok_or_else(|| {
            warn!("No staff profile found for user {}", user.id);
            AppError::Forbidden("No staff profile found for this user".to_string())
        })?;

    let clinic_id = profile.clinic_id.ok_or_else(|| {
        warn!("User {} is not linked to a clinic", user.id);
        AppError::Forbidden("User is not linked to a clinic".to_string())
    })?;

    let role = profile
        .role
        .as_deref()
        .map(StaffRole::parse)
        .unwrap_or(StaffRole::Other);

    debug!("Resolved context for user {}: clinic {} role {}", user_id, clinic_id, role);

    Ok(RequestContext::new(user_id, clinic_id, role, auth_token))
}
