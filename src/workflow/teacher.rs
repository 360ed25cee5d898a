use std::sync::Arc;

use crate::access::{require_admin, require_teacher, Capabilities};
use crate::config::UploadLimits;
use crate::data::api_key::ApiKeyConfig;
use crate::data::assignment::{Assignment, NewAssignment};
use crate::data::class::Class;
use crate::data::submission::{GradeOutcome, GradeSummary, Submission};
use crate::data::user::User;
use crate::directory::ClassDirectory;
use crate::error::{AccessError, DeskError, PreconditionError};
use crate::gateway::GatewayClient;
use crate::util;
use crate::workflow::{tag_with_classes, AssignmentDraft};

/// Submissions of one assignment, as shown on the grading screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradingBoard {
    pub submissions: Vec<Submission>,
}

impl GradingBoard {
    pub fn ungraded(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.iter().filter(|it| !it.is_graded)
    }

    pub fn ungraded_count(&self) -> usize {
        self.ungraded().count()
    }

    pub fn find(&self, submission_id: &str) -> Option<&Submission> {
        self.submissions.iter().find(|it| it.id == submission_id)
    }
}

pub struct TeacherDesk {
    gateway: GatewayClient,
    directory: Arc<ClassDirectory>,
    limits: UploadLimits,
}

impl TeacherDesk {
    pub fn new(gateway: GatewayClient, directory: Arc<ClassDirectory>, limits: UploadLimits) -> TeacherDesk {
        TeacherDesk {
            gateway,
            directory,
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub async fn classes(&self, teacher: &User) -> Result<Vec<Class>, DeskError> {
        require_teacher(teacher)?;
        Ok(self.directory.classes_by_teacher(&teacher.id).await?)
    }

    /// Assignments of the teacher's own classes, tagged with the class name.
    ///
    /// The gateway has no per-teacher query, so everything is fetched once and filtered here.
    #[tracing::instrument(skip(self, teacher), fields(teacher = %teacher.id))]
    pub async fn assignments(&self, teacher: &User) -> Result<Vec<Assignment>, DeskError> {
        let classes = self.classes(teacher).await?;
        if classes.is_empty() {
            return Ok(vec![]);
        }
        let assignments = self.gateway.get_assignments(None).await?;
        Ok(tag_with_classes(&classes, assignments))
    }

    #[tracing::instrument(skip(self, teacher, draft), fields(teacher = %teacher.id))]
    pub async fn create_assignment(&self, teacher: &User, draft: AssignmentDraft) -> Result<(), DeskError> {
        let caps = require_teacher(teacher)?;
        draft.validate(&self.limits)?;

        let class = self.directory.find_class(draft.class_id.trim()).await?;
        check_owner(&caps, teacher, &class)?;

        let solution_images: Vec<String> = draft.solution_images.into_iter().map(|it| it.data).collect();
        let mut assignment = NewAssignment {
            class_id: class.id,
            title: draft.title.trim().to_string(),
            description: util::non_blank(draft.description.as_ref()),
            problem_text: util::non_blank(draft.problem_text.as_ref()),
            teacher_id: teacher.id.clone(),
            due_date: util::non_blank(draft.due_date.as_ref()),
            attachment_base64: None,
            attachment_file_name: None,
            solution_images: Some(solution_images).filter(|it| !it.is_empty()),
        };
        if let Some(attachment) = draft.attachment {
            assignment.attach(attachment);
        }

        self.gateway.create_assignment(&assignment).await?;
        tracing::info!("Created assignment '{}'.", assignment.title);
        Ok(())
    }

    #[tracing::instrument(skip(self, teacher), fields(teacher = %teacher.id))]
    pub async fn delete_assignment(&self, teacher: &User, assignment_id: &str) -> Result<(), DeskError> {
        require_teacher(teacher)?;
        self.gateway.delete_assignment(assignment_id).await?;
        tracing::info!("Deleted assignment.");
        Ok(())
    }

    pub async fn submissions(&self, teacher: &User, assignment_id: &str) -> Result<GradingBoard, DeskError> {
        require_teacher(teacher)?;
        let submissions = self.gateway.get_submissions(assignment_id).await?;
        Ok(GradingBoard { submissions })
    }

    /// Grades one submission. Graded submissions are never sent again.
    #[tracing::instrument(skip(self, teacher), fields(teacher = %teacher.id))]
    pub async fn grade(
        &self,
        teacher: &User,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<GradeOutcome, DeskError> {
        let board = self.submissions(teacher, assignment_id).await?;
        match board.find(submission_id) {
            Some(submission) if submission.is_graded => {
                return Err(PreconditionError::AlreadyGraded.into())
            }
            Some(_) => {}
            None => return Err(DeskError::SubmissionNotFound(submission_id.to_string())),
        }

        let outcome = self.gateway.grade_submission(submission_id).await?;
        tracing::info!("Graded submission, score {:?}.", outcome.score);
        Ok(outcome)
    }

    /// One gateway call grading every ungraded submission, followed by a reload.
    #[tracing::instrument(skip(self, teacher), fields(teacher = %teacher.id))]
    pub async fn grade_all(
        &self,
        teacher: &User,
        assignment_id: &str,
    ) -> Result<(GradeSummary, GradingBoard), DeskError> {
        let board = self.submissions(teacher, assignment_id).await?;
        if board.ungraded_count() == 0 {
            return Err(PreconditionError::NothingToGrade.into());
        }

        let summary = self.gateway.grade_all_submissions(assignment_id).await?;
        tracing::info!(
            "Graded {} submissions, {} failed.",
            summary.graded_count,
            summary.error_count
        );

        let board = self.submissions(teacher, assignment_id).await?;
        Ok((summary, board))
    }

    pub async fn api_keys(&self, teacher: &User) -> Result<Vec<ApiKeyConfig>, DeskError> {
        require_teacher(teacher)?;
        Ok(self.gateway.get_api_keys().await?)
    }

    #[tracing::instrument(skip(self, teacher, key), fields(teacher = %teacher.id))]
    pub async fn add_api_key(&self, teacher: &User, name: &str, key: &str) -> Result<(), DeskError> {
        require_teacher(teacher)?;
        let name = util::non_blank(Some(name)).ok_or(PreconditionError::Blank("key name"))?;
        let key = util::non_blank(Some(key)).ok_or(PreconditionError::Blank("API key"))?;
        self.gateway.add_api_key(&name, &key).await?;
        Ok(())
    }

    pub async fn remove_api_key(&self, teacher: &User, key_id: &str) -> Result<(), DeskError> {
        require_teacher(teacher)?;
        Ok(self.gateway.remove_api_key(key_id).await?)
    }

    pub async fn toggle_api_key(&self, teacher: &User, key_id: &str) -> Result<Option<bool>, DeskError> {
        require_teacher(teacher)?;
        Ok(self.gateway.toggle_api_key(key_id).await?)
    }

    /// Stores a new gateway address for every client.
    ///
    /// Addresses failing the format check are refused and never stored.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn configure_gateway(&self, actor: &User, url: &str) -> Result<(), DeskError> {
        require_admin(actor)?;
        let url = url.trim();
        if url.is_empty() {
            return Err(PreconditionError::Blank("gateway URL").into());
        }
        let config = self.gateway.config();
        if !config.matches_pattern(url) {
            tracing::warn!("Refusing malformed gateway address.");
            return Err(PreconditionError::MalformedGatewayUrl(url.to_string()).into());
        }
        config.save(url).await?;
        Ok(())
    }
}

fn check_owner(caps: &Capabilities, teacher: &User, class: &Class) -> Result<(), AccessError> {
    if class.teacher_id != teacher.id && !caps.is_admin {
        return Err(AccessError::Forbidden("class owner required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use serde_json::{json, Value};

    use super::*;
    use crate::data::class::ClassCreateData;
    use crate::data::upload::EncodedFile;
    use crate::gateway::tests::configured;
    use crate::gateway::transport::scripted::ScriptedTransport;
    use crate::gateway::transport::Reply;
    use crate::role::Role;
    use crate::store::MemoryStore;

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: None,
            avatar: None,
            role,
            is_approved: true,
            created_at: Utc::now(),
        }
    }

    fn submission(id: &str, graded: bool) -> Value {
        json!({
            "id": id,
            "assignmentId": "a1",
            "studentId": format!("student-{}", id),
            "studentName": id,
            "isGraded": graded,
            "score": if graded { json!("7.5") } else { Value::Null },
        })
    }

    /// Spreadsheet stand-in: five submissions, three of them ungraded.
    fn grading_gateway() -> Arc<ScriptedTransport> {
        let sheet = Mutex::new(vec![
            submission("s1", true),
            submission("s2", false),
            submission("s3", true),
            submission("s4", false),
            submission("s5", false),
        ]);
        Arc::new(ScriptedTransport::new(move |data| {
            let mut sheet = sheet.lock().unwrap();
            let body = match data["action"].as_str() {
                Some("getSubmissions") => json!({ "success": true, "submissions": sheet.clone() }),
                Some("gradeAllSubmissions") => {
                    let mut graded = 0;
                    for row in sheet.iter_mut().filter(|it| it["isGraded"] == false) {
                        row["isGraded"] = json!(true);
                        row["score"] = json!(8);
                        graded += 1;
                    }
                    json!({ "success": true, "gradedCount": graded, "errorCount": 0 })
                }
                Some("gradeSubmission") => {
                    json!({ "success": true, "score": "9", "feedback": "Good work" })
                }
                Some("getAssignments") => json!({
                    "success": true,
                    "assignments": [
                        { "id": "a1", "classId": "c-mine", "title": "Fractions" },
                        { "id": "a2", "classId": "c-other", "title": "Decimals" },
                    ],
                }),
                Some("createAssignment") | Some("addApiKey") => json!({ "success": true }),
                _ => json!({ "success": false, "error": "unknown action" }),
            };
            Ok(Reply::ok(body.to_string()))
        }))
    }

    async fn desk(transport: Arc<ScriptedTransport>) -> (TeacherDesk, Arc<ClassDirectory>) {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(ClassDirectory::new(store));
        let desk = TeacherDesk::new(
            configured(transport).await,
            directory.clone(),
            UploadLimits::default(),
        );
        (desk, directory)
    }

    #[tokio::test]
    async fn grade_all_grades_only_the_ungraded() {
        let transport = grading_gateway();
        let (desk, _) = desk(transport.clone()).await;
        let teacher = user("t", Role::Teacher);

        let before = desk.submissions(&teacher, "a1").await.unwrap();
        assert_eq!(before.ungraded_count(), 3);

        let (summary, after) = desk.grade_all(&teacher, "a1").await.unwrap();
        assert_eq!(
            summary,
            GradeSummary {
                graded_count: 3,
                error_count: 0
            }
        );
        assert_eq!(after.ungraded_count(), 0);
        assert_eq!(after.find("s1").unwrap().score, Some(7.5));
        assert_eq!(after.find("s2").unwrap().score, Some(8.0));

        let grading_calls = transport
            .actions()
            .iter()
            .filter(|it| *it == "gradeAllSubmissions")
            .count();
        assert_eq!(grading_calls, 1);

        assert!(matches!(
            desk.grade_all(&teacher, "a1").await,
            Err(DeskError::Precondition(PreconditionError::NothingToGrade))
        ));
    }

    #[tokio::test]
    async fn graded_submissions_are_not_regraded() {
        let transport = grading_gateway();
        let (desk, _) = desk(transport.clone()).await;
        let teacher = user("t", Role::Teacher);

        assert!(matches!(
            desk.grade(&teacher, "a1", "s1").await,
            Err(DeskError::Precondition(PreconditionError::AlreadyGraded))
        ));
        assert!(!transport.actions().contains(&"gradeSubmission".to_string()));

        let outcome = desk.grade(&teacher, "a1", "s2").await.unwrap();
        assert_eq!(outcome.score, Some(9.0));
        assert_eq!(outcome.feedback.as_deref(), Some("Good work"));
    }

    #[tokio::test]
    async fn students_cannot_use_the_desk() {
        let transport = grading_gateway();
        let (desk, _) = desk(transport.clone()).await;

        assert!(matches!(
            desk.grade_all(&user("s", Role::Student), "a1").await,
            Err(DeskError::Access(AccessError::Forbidden(_)))
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn create_assignment_checks_ownership_and_encodes_files() {
        let transport = grading_gateway();
        let (desk, directory) = desk(transport.clone()).await;
        let owner = user("t1", Role::Teacher);
        let other = user("t2", Role::Teacher);
        let class = directory
            .create_class(
                &owner,
                ClassCreateData {
                    name: "Math A".into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let draft = AssignmentDraft {
            class_id: class.id.clone(),
            title: " Fractions ".into(),
            problem_text: Some("1/2 + 1/3".into()),
            attachment: Some(EncodedFile::from_bytes("notes.txt", b"hello", 1024).unwrap()),
            solution_images: vec![EncodedFile::from_bytes("key.png", b"png", 1024).unwrap()],
            ..AssignmentDraft::default()
        };

        assert!(matches!(
            desk.create_assignment(&other, draft.clone()).await,
            Err(DeskError::Access(AccessError::Forbidden(_)))
        ));
        desk.create_assignment(&owner, draft).await.unwrap();

        let (_, sent) = transport.requests().pop().unwrap();
        assert_eq!(sent["action"], "createAssignment");
        assert_eq!(sent["title"], "Fractions");
        assert_eq!(sent["classId"], json!(class.id));
        assert_eq!(sent["attachmentBase64"], "aGVsbG8=");
        assert_eq!(sent["attachmentFileName"], "notes.txt");
        assert_eq!(sent["solutionImages"], json!(["cG5n"]));
    }

    #[tokio::test]
    async fn blank_api_key_is_rejected_locally() {
        let transport = grading_gateway();
        let (desk, _) = desk(transport.clone()).await;
        let teacher = user("t", Role::Teacher);

        assert!(matches!(
            desk.add_api_key(&teacher, "primary", "   ").await,
            Err(DeskError::Precondition(PreconditionError::Blank(_)))
        ));
        assert!(transport.requests().is_empty());
        desk.add_api_key(&teacher, "primary", "AIzaSyExample").await.unwrap();
    }

    #[tokio::test]
    async fn gateway_address_is_admin_only() {
        let transport = grading_gateway();
        let (desk, _) = desk(transport).await;
        let current = desk.gateway.config().url();

        assert!(matches!(
            desk.configure_gateway(&user("t", Role::Teacher), "https://example.com").await,
            Err(DeskError::Access(AccessError::Forbidden(_)))
        ));
        let admin = user("a", Role::Admin);
        assert!(matches!(
            desk.configure_gateway(&admin, "https://example.com/exec").await,
            Err(DeskError::Precondition(PreconditionError::MalformedGatewayUrl(_)))
        ));
        assert_eq!(desk.gateway.config().url(), current);
        assert!(desk.gateway.config().is_configured());

        desk.configure_gateway(&admin, " https://script.google.com/macros/s/new/exec ")
            .await
            .unwrap();
        assert_eq!(
            desk.gateway.config().url().as_deref(),
            Some("https://script.google.com/macros/s/new/exec")
        );
    }
}
