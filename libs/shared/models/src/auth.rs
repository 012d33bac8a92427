use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Staff,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    /// Staff and admins act on behalf of any patient or doctor.
    pub fn is_clinic_staff(&self) -> bool {
        matches!(self.role, Some(Role::Staff) | Some(Role::Admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Staff".parse::<Role>().unwrap(), Role::Staff);
        assert_eq!(" doctor ".parse::<Role>().unwrap(), Role::Doctor);
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn only_staff_and_admin_count_as_clinic_staff() {
        let mut user = User {
            id: "u1".to_string(),
            email: None,
            role: Some(Role::Doctor),
            department_id: None,
            created_at: None,
        };
        assert!(!user.is_clinic_staff());
        user.role = Some(Role::Admin);
        assert!(user.is_clinic_staff());
    }
}
