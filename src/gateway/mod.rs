//! Client of the spreadsheet-backed grading gateway.
//!
//! Every operation is a named wrapper over one primitive: POST a form with a single `data`
//! field holding `{action, ...payload}` as JSON, and read back an [`ApiResponse`] envelope.
//! A plain form body keeps the request "simple", so browsers and proxies never preflight it.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

pub mod transport;

use crate::data::api_key::ApiKeyConfig;
use crate::data::assignment::{Assignment, NewAssignment};
use crate::data::submission::{GradeOutcome, GradeSummary, NewSubmission, Submission};
use crate::remote_config::RemoteConfig;
use crate::resp::api::{ApiResponse, GatewayError};
use crate::util;
use transport::{HttpTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateAssignment,
    GetAssignments,
    DeleteAssignment,
    SubmitAssignment,
    GetSubmissions,
    GetStudentSubmission,
    GradeSubmission,
    GradeAllSubmissions,
    GetApiKeys,
    AddApiKey,
    RemoveApiKey,
    ToggleApiKey,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::CreateAssignment,
        Action::GetAssignments,
        Action::DeleteAssignment,
        Action::SubmitAssignment,
        Action::GetSubmissions,
        Action::GetStudentSubmission,
        Action::GradeSubmission,
        Action::GradeAllSubmissions,
        Action::GetApiKeys,
        Action::AddApiKey,
        Action::RemoveApiKey,
        Action::ToggleApiKey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreateAssignment => "createAssignment",
            Action::GetAssignments => "getAssignments",
            Action::DeleteAssignment => "deleteAssignment",
            Action::SubmitAssignment => "submitAssignment",
            Action::GetSubmissions => "getSubmissions",
            Action::GetStudentSubmission => "getStudentSubmission",
            Action::GradeSubmission => "gradeSubmission",
            Action::GradeAllSubmissions => "gradeAllSubmissions",
            Action::GetApiKeys => "getApiKeys",
            Action::AddApiKey => "addApiKey",
            Action::RemoveApiKey => "removeApiKey",
            Action::ToggleApiKey => "toggleApiKey",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// Serializes `payload` and stamps the action name into it.
fn envelope(action: Action, payload: impl Serialize) -> Result<String, GatewayError> {
    let mut fields = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            return Err(GatewayError::Encode(format!(
                "payload must be an object, got {}",
                other
            )))
        }
        Err(e) => return Err(GatewayError::Encode(e.to_string())),
    };
    fields.insert("action".to_string(), Value::from(action.as_str()));

    Ok(Value::Object(fields).to_string())
}

#[derive(Clone)]
pub struct GatewayClient {
    config: Arc<RemoteConfig>,
    transport: Arc<dyn Transport>,
}

impl GatewayClient {
    pub fn new(config: Arc<RemoteConfig>, transport: Arc<dyn Transport>) -> GatewayClient {
        GatewayClient { config, transport }
    }

    pub fn http(config: Arc<RemoteConfig>) -> GatewayClient {
        GatewayClient::new(config, Arc::new(HttpTransport::new()))
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// The union-returning primitive: never fails, every error becomes `{success: false}`.
    pub async fn call(&self, action: Action, payload: impl Serialize) -> ApiResponse {
        self.exchange(action, payload)
            .await
            .unwrap_or_else(ApiResponse::from)
    }

    /// Like [`call`](Self::call), with business failures turned into
    /// [`GatewayError::Rejected`].
    pub async fn send(
        &self,
        action: Action,
        payload: impl Serialize,
    ) -> Result<ApiResponse, GatewayError> {
        self.exchange(action, payload).await?.into_result()
    }

    #[tracing::instrument(skip_all, fields(action = %action))]
    async fn exchange(
        &self,
        action: Action,
        payload: impl Serialize,
    ) -> Result<ApiResponse, GatewayError> {
        let url = match self.config.url() {
            Some(url) if self.config.is_configured() => url,
            _ => {
                tracing::debug!("Gateway isn't configured, skipping request.");
                return Err(GatewayError::NotConfigured);
            }
        };
        let data = envelope(action, payload)?;

        let reply = self
            .transport
            .post_form(&url, &[("data", data)])
            .await
            .map_err(|e| {
                tracing::error!("Gateway call failed: {}", e);
                e
            })?;

        match serde_json::from_str::<ApiResponse>(&reply.body) {
            Ok(response) if !reply.is_success() && response.success => {
                Err(GatewayError::Transport(format!("HTTP {}", reply.status)))
            }
            Ok(response) => Ok(response),
            Err(_) if !reply.is_success() && reply.body.trim().is_empty() => {
                Err(GatewayError::Transport(format!("HTTP {}", reply.status)))
            }
            Err(_) => {
                tracing::error!(
                    "Invalid JSON response: {}",
                    util::excerpt(&reply.body, 500)
                );
                Err(GatewayError::invalid_body(&reply.body))
            }
        }
    }

    pub async fn create_assignment(
        &self,
        assignment: &NewAssignment,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(Action::CreateAssignment, assignment).await
    }

    /// All assignments, or only those of `class_id`.
    pub async fn get_assignments(
        &self,
        class_id: Option<&str>,
    ) -> Result<Vec<Assignment>, GatewayError> {
        let payload = match class_id {
            Some(class_id) => json!({ "classId": class_id }),
            None => json!({}),
        };
        let response = self.send(Action::GetAssignments, payload).await?;
        Ok(response.field("assignments")?.unwrap_or_default())
    }

    pub async fn delete_assignment(&self, assignment_id: &str) -> Result<(), GatewayError> {
        self.send(
            Action::DeleteAssignment,
            json!({ "assignmentId": assignment_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn submit_assignment(
        &self,
        submission: &NewSubmission,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(Action::SubmitAssignment, submission).await
    }

    pub async fn get_submissions(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<Submission>, GatewayError> {
        let response = self
            .send(
                Action::GetSubmissions,
                json!({ "assignmentId": assignment_id }),
            )
            .await?;
        Ok(response.field("submissions")?.unwrap_or_default())
    }

    pub async fn get_student_submission(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<Submission>, GatewayError> {
        let response = self
            .send(
                Action::GetStudentSubmission,
                json!({ "assignmentId": assignment_id, "studentId": student_id }),
            )
            .await?;
        response.field("submission")
    }

    pub async fn grade_submission(&self, submission_id: &str) -> Result<GradeOutcome, GatewayError> {
        self.send(
            Action::GradeSubmission,
            json!({ "submissionId": submission_id }),
        )
        .await?
        .decode()
    }

    /// Grades every ungraded submission of the assignment in one server-side pass.
    pub async fn grade_all_submissions(
        &self,
        assignment_id: &str,
    ) -> Result<GradeSummary, GatewayError> {
        self.send(
            Action::GradeAllSubmissions,
            json!({ "assignmentId": assignment_id }),
        )
        .await?
        .decode()
    }

    pub async fn get_api_keys(&self) -> Result<Vec<ApiKeyConfig>, GatewayError> {
        let response = self.send(Action::GetApiKeys, json!({})).await?;
        Ok(response.field("keys")?.unwrap_or_default())
    }

    pub async fn add_api_key(&self, name: &str, key: &str) -> Result<(), GatewayError> {
        self.send(Action::AddApiKey, json!({ "name": name, "key": key }))
            .await?;
        Ok(())
    }

    pub async fn remove_api_key(&self, key_id: &str) -> Result<(), GatewayError> {
        self.send(Action::RemoveApiKey, json!({ "keyId": key_id }))
            .await?;
        Ok(())
    }

    /// Returns the key's new `isActive` state when the gateway reports it.
    pub async fn toggle_api_key(&self, key_id: &str) -> Result<Option<bool>, GatewayError> {
        self.send(Action::ToggleApiKey, json!({ "keyId": key_id }))
            .await?
            .field("isActive")
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .finish()
    }
}
