use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod db;

use crate::identity::provider::ProviderAccount;
use crate::role::Role;

pub static USER_COLLECTION_NAME: &str = "users";

/// Profile record keyed by the identity provider's subject id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Builds the profile for a first sign-in.
    ///
    /// The bootstrap user becomes an approved admin, everyone else starts as an unapproved
    /// student.
    pub fn from_account(account: &ProviderAccount, bootstrap: bool) -> User {
        let (role, is_approved) = if bootstrap {
            (Role::Admin, true)
        } else {
            (Role::Student, false)
        };

        User {
            id: account.uid.clone(),
            name: account
                .display_name
                .clone()
                .filter(|it| !it.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            email: account.email.clone(),
            avatar: account.photo_url.clone(),
            role,
            is_approved,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_teacher(&self) -> bool {
        self.role.is_teacher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: Option<&str>) -> ProviderAccount {
        ProviderAccount {
            uid: "uid-1".to_string(),
            display_name: name.map(str::to_string),
            email: Some("ana@school.edu".to_string()),
            photo_url: None,
        }
    }

    #[test]
    fn bootstrap_user_is_approved_admin() {
        let user = User::from_account(&account(Some("Ana")), true);
        assert_eq!(user.role, Role::Admin);
        assert!(user.is_approved);
        assert_eq!(user.name, "Ana");
    }

    #[test]
    fn later_users_wait_as_students() {
        let user = User::from_account(&account(None), false);
        assert_eq!(user.role, Role::Student);
        assert!(!user.is_approved);
        assert_eq!(user.name, "Unknown");
    }

    #[test]
    fn stored_document_defaults() {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "u2",
            "name": "Bao",
        }))
        .expect("sparse profile should deserialize");
        assert_eq!(user.role, Role::Student);
        assert!(!user.is_approved);
        assert_eq!(user.email, None);
    }
}
