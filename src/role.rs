use serde::{Deserialize, Serialize};

/// Durable permission level stored on a user profile.
///
/// Unknown role strings read back from the store are treated as [`Role::Student`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Leader,
    Teacher,
    #[serde(other)]
    Student,
}

impl Role {
    /// Admins and leaders manage users and see admin-only panels.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Leader)
    }

    /// Indicates whether user with role can own classes and assignments
    pub fn is_teacher(self) -> bool {
        matches!(self, Role::Admin | Role::Leader | Role::Teacher)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Leader => "leader",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl std::default::Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "leader" => Ok(Role::Leader),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_derivation() {
        assert!(Role::Admin.is_admin() && Role::Admin.is_teacher());
        assert!(Role::Leader.is_admin() && Role::Leader.is_teacher());
        assert!(!Role::Teacher.is_admin() && Role::Teacher.is_teacher());
        assert!(!Role::Student.is_admin() && !Role::Student.is_teacher());
    }

    #[test]
    fn unknown_role_reads_as_student() {
        let role: Role = serde_json::from_str("\"janitor\"").expect("other variant");
        assert_eq!(role, Role::Student);
        assert_eq!(serde_json::to_string(&Role::Leader).unwrap(), "\"leader\"");
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Teacher".parse::<Role>(), Ok(Role::Teacher));
        assert!("owner".parse::<Role>().is_err());
    }
}
