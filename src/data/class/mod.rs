use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod db;

use crate::data::user::User;

pub static CLASS_COLLECTION_NAME: &str = "classes";
pub static MEMBERSHIP_COLLECTION_NAME: &str = "class.students";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub code: String,
    pub teacher_id: String,
    #[serde(default)]
    pub teacher_name: String,
    /// Live count of membership records, rewritten after every join.
    #[serde(default)]
    pub student_count: u32,
    /// Pending invites: lower-cased emails pre-authorized before the student joined.
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn is_invited(&self, email: &str) -> bool {
        self.students.iter().any(|it| it == email)
    }
}

/// Confirmed student-in-class record, keyed by (class id, student id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub class_id: String,
    #[serde(rename = "studentId")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "Utc::now")]
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(class_id: impl Into<String>, student: &User) -> Membership {
        Membership {
            class_id: class_id.into(),
            id: student.id.clone(),
            name: student.name.clone(),
            email: student.email.clone(),
            avatar: student.avatar.clone(),
            joined_at: Utc::now(),
        }
    }

    /// Document key of the record in the membership collection.
    pub fn key(class_id: &str, student_id: &str) -> String {
        format!("{}:{}", class_id, student_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCreateData {
    pub name: String,
    pub description: Option<String>,
}
