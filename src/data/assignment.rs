use serde::{Deserialize, Serialize};

use super::upload::EncodedFile;

/// Assignment as stored by the gateway. Never cached as a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub class_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Reference text the grader compares answers against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub solution_image_ids: Vec<String>,
    #[serde(default)]
    pub solution_images_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub teacher_id: String,
    /// Filled in locally from the teacher's class list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// `createAssignment` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub class_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_text: Option<String>,
    pub teacher_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_images: Option<Vec<String>>,
}

impl NewAssignment {
    pub fn attach(&mut self, file: EncodedFile) {
        self.attachment_file_name = Some(file.name);
        self.attachment_base64 = Some(file.data);
    }
}
