use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role of a staff member inside their clinic, as stored on the `profiles` row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Owner,
    Admin,
    Professional,
    Receptionist,
    #[serde(other)]
    Other,
}

impl StaffRole {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => StaffRole::Owner,
            "admin" => StaffRole::Admin,
            "professional" | "doctor" | "therapist" => StaffRole::Professional,
            "receptionist" | "secretary" => StaffRole::Receptionist,
            _ => StaffRole::Other,
        }
    }

    /// Owners and admins may perform destructive operations such as deletes.
    pub fn is_privileged(&self) -> bool {
        matches!(self, StaffRole::Owner | StaffRole::Admin)
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Owner => write!(f, "owner"),
            StaffRole::Admin => write!(f, "admin"),
            StaffRole::Professional => write!(f, "professional"),
            StaffRole::Receptionist => write!(f, "receptionist"),
            StaffRole::Other => write!(f, "other"),
        }
    }
}

/// Row of the `profiles` table that ties an authenticated user to a clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffProfile {
    pub id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub role: Option<String>,
    pub full_name: Option<String>,
}

/// Everything an operation needs to know about its caller. Built once per
/// request from the validated token and the caller's profile, then passed
/// explicitly into every service call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub clinic_id: Uuid,
    pub role: StaffRole,
    pub auth_token: String,
}

impl RequestContext {
    pub fn new(user_id: Uuid, clinic_id: Uuid, role: StaffRole, auth_token: impl Into<String>) -> Self {
        Self {
            user_id,
            clinic_id,
            role,
            auth_token: auth_token.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!(StaffRole::parse("Admin"), StaffRole::Admin);
        assert_eq!(StaffRole::parse("owner"), StaffRole::Owner);
        assert_eq!(StaffRole::parse("doctor"), StaffRole::Professional);
        assert_eq!(StaffRole::parse("intern"), StaffRole::Other);
    }

    #[test]
    fn test_privileged_roles() {
        assert!(StaffRole::Owner.is_privileged());
        assert!(StaffRole::Admin.is_privileged());
        assert!(!StaffRole::Professional.is_privileged());
        assert!(!StaffRole::Receptionist.is_privileged());
        assert!(!StaffRole::Other.is_privileged());
    }

    #[test]
    fn test_unknown_role_deserializes_as_other() {
        let role: StaffRole = serde_json::from_str("\"intern\"").unwrap();
        assert_eq!(role, StaffRole::Other);
    }
}
