use std::sync::Arc;

use crate::access::require_approved;
use crate::config::UploadLimits;
use crate::data::assignment::Assignment;
use crate::data::class::Class;
use crate::data::submission::{NewSubmission, Submission};
use crate::data::user::User;
use crate::directory::ClassDirectory;
use crate::error::{DeskError, PreconditionError};
use crate::gateway::GatewayClient;
use crate::util;
use crate::workflow::{tag_with_classes, SubmissionDraft, WorkStatus};

/// Assignment as a student sees it, with their own submission if any.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentWork {
    pub assignment: Assignment,
    pub submission: Option<Submission>,
}

impl StudentWork {
    pub fn status(&self) -> WorkStatus {
        WorkStatus::of(self.submission.as_ref())
    }
}

pub struct StudentDesk {
    gateway: GatewayClient,
    directory: Arc<ClassDirectory>,
    limits: UploadLimits,
}

impl StudentDesk {
    pub fn new(gateway: GatewayClient, directory: Arc<ClassDirectory>, limits: UploadLimits) -> StudentDesk {
        StudentDesk {
            gateway,
            directory,
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub async fn classes(&self, student: &User) -> Result<Vec<Class>, DeskError> {
        require_approved(student)?;
        Ok(self
            .directory
            .classes_for_student(&student.id, student.email.as_deref())
            .await?)
    }

    pub async fn join(&self, student: &User, code: &str) -> Result<Class, DeskError> {
        Ok(self.directory.join_by_code(code, student).await?)
    }

    /// Assignments of every class the student belongs to, tagged with the class name.
    #[tracing::instrument(skip(self, student), fields(student = %student.id))]
    pub async fn assignments(&self, student: &User) -> Result<Vec<Assignment>, DeskError> {
        let classes = self.classes(student).await?;
        if classes.is_empty() {
            return Ok(vec![]);
        }
        let assignments = self.gateway.get_assignments(None).await?;
        Ok(tag_with_classes(&classes, assignments))
    }

    pub async fn work(&self, student: &User, assignment: Assignment) -> Result<StudentWork, DeskError> {
        require_approved(student)?;
        let submission = self
            .gateway
            .get_student_submission(&assignment.id, &student.id)
            .await?;
        Ok(StudentWork {
            assignment,
            submission,
        })
    }

    /// Sends the student's one and only submission for `assignment_id`.
    #[tracing::instrument(skip(self, student, draft), fields(student = %student.id))]
    pub async fn submit(
        &self,
        student: &User,
        assignment_id: &str,
        draft: SubmissionDraft,
    ) -> Result<(), DeskError> {
        require_approved(student)?;
        draft.validate(&self.limits)?;

        let existing = self
            .gateway
            .get_student_submission(assignment_id, &student.id)
            .await?;
        if existing.is_some() {
            return Err(PreconditionError::AlreadySubmitted.into());
        }

        let images: Vec<String> = draft.images.into_iter().map(|it| it.data).collect();
        let submission = NewSubmission {
            assignment_id: assignment_id.to_string(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            student_email: student.email.clone(),
            images: Some(images).filter(|it| !it.is_empty()),
            text_answer: util::non_blank(draft.text_answer.as_ref()),
        };
        self.gateway.submit_assignment(&submission).await?;
        tracing::info!("Submitted assignment.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use serde_json::{json, Value};

    use super::*;
    use crate::data::upload::EncodedFile;
    use crate::gateway::tests::configured;
    use crate::gateway::transport::scripted::ScriptedTransport;
    use crate::gateway::transport::Reply;
    use crate::role::Role;
    use crate::store::{ClassStore, MemoryStore};

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: Some(format!("{}@school.edu", id)),
            avatar: None,
            role,
            is_approved: true,
            created_at: Utc::now(),
        }
    }

    /// Gateway holding at most one submission per student.
    fn gateway_with_submissions() -> Arc<ScriptedTransport> {
        let stored: Mutex<Vec<Value>> = Mutex::new(vec![]);
        Arc::new(ScriptedTransport::new(move |data| {
            let mut stored = stored.lock().unwrap();
            let body = match data["action"].as_str() {
                Some("getStudentSubmission") => {
                    let found = stored
                        .iter()
                        .find(|it| it["studentId"] == data["studentId"])
                        .cloned();
                    json!({ "success": true, "submission": found })
                }
                Some("submitAssignment") => {
                    let mut record = data.clone();
                    record["id"] = json!(format!("sub-{}", stored.len() + 1));
                    stored.push(record);
                    json!({ "success": true })
                }
                Some("getAssignments") => json!({
                    "success": true,
                    "assignments": [
                        { "id": "a1", "classId": "mine", "title": "Fractions" },
                        { "id": "a2", "classId": "other", "title": "Decimals" },
                    ],
                }),
                _ => json!({ "success": false, "error": "unknown action" }),
            };
            Ok(Reply::ok(body.to_string()))
        }))
    }

    async fn desk(transport: Arc<ScriptedTransport>) -> (StudentDesk, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(ClassDirectory::new(store.clone()));
        let desk = StudentDesk::new(configured(transport).await, directory, UploadLimits::default());
        (desk, store)
    }

    #[tokio::test]
    async fn empty_submission_never_reaches_the_gateway() {
        let transport = gateway_with_submissions();
        let (desk, _) = desk(transport.clone()).await;

        let result = desk
            .submit(&user("s", Role::Student), "a1", SubmissionDraft::default())
            .await;
        assert!(matches!(
            result,
            Err(DeskError::Precondition(PreconditionError::EmptySubmission))
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn second_submission_is_refused() {
        let transport = gateway_with_submissions();
        let (desk, _) = desk(transport.clone()).await;
        let student = user("s", Role::Student);

        let mut draft = SubmissionDraft::text("5/6");
        draft
            .add_image(EncodedFile::from_bytes("work.png", b"png", 1024).unwrap(), desk.limits())
            .unwrap();
        desk.submit(&student, "a1", draft).await.unwrap();

        let sent = &transport.requests()[1].1;
        assert_eq!(sent["action"], "submitAssignment");
        assert_eq!(sent["images"], json!(["cG5n"]));
        assert_eq!(sent["textAnswer"], "5/6");

        assert!(matches!(
            desk.submit(&student, "a1", SubmissionDraft::text("again")).await,
            Err(DeskError::Precondition(PreconditionError::AlreadySubmitted))
        ));
    }

    #[tokio::test]
    async fn assignments_are_limited_to_joined_classes() {
        let transport = gateway_with_submissions();
        let (desk, store) = desk(transport).await;
        let student = user("s", Role::Student);
        store
            .insert_class(&Class {
                id: "mine".into(),
                name: "Math A".into(),
                description: None,
                code: "QX7K2M".into(),
                teacher_id: "t".into(),
                teacher_name: "T".into(),
                student_count: 0,
                students: vec![],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(desk.assignments(&student).await.unwrap().is_empty());

        desk.join(&student, "qx7k2m").await.unwrap();
        let assignments = desk.assignments(&student).await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].id, "a1");
        assert_eq!(assignments[0].class_name.as_deref(), Some("Math A"));

        let work = desk.work(&student, assignments[0].clone()).await.unwrap();
        assert_eq!(work.status(), WorkStatus::Unsubmitted);
    }
}
