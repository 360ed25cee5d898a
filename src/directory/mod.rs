//! Classes, join codes and the two membership channels.
//!
//! A student belongs to a class through a membership record keyed by student id, or through a
//! pending invite naming their email. Joining promotes an invite into a membership; reads merge
//! both channels so a half-finished promotion never hides or duplicates a class.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

pub mod code;

use crate::access::{require_approved, require_teacher};
use crate::data::class::{Class, ClassCreateData, Membership};
use crate::data::user::User;
use crate::error::{AccessError, DirectoryError, PreconditionError, StoreError};
use crate::store::ClassStore;
use crate::util;
use code::{normalize_code, CodeGenerator, RandomCodes, MAX_CODE_ATTEMPTS};

pub struct ClassDirectory {
    store: Arc<dyn ClassStore>,
    codes: Box<dyn CodeGenerator>,
}

impl ClassDirectory {
    pub fn new(store: Arc<dyn ClassStore>) -> ClassDirectory {
        ClassDirectory::with_codes(store, Box::new(RandomCodes))
    }

    pub fn with_codes(store: Arc<dyn ClassStore>, codes: Box<dyn CodeGenerator>) -> ClassDirectory {
        ClassDirectory { store, codes }
    }

    /// Creates a class owned by `teacher` under a fresh join code.
    #[tracing::instrument(skip(self, teacher, data), fields(teacher = %teacher.id))]
    pub async fn create_class(
        &self,
        teacher: &User,
        data: ClassCreateData,
    ) -> Result<Class, DirectoryError> {
        require_teacher(teacher)?;
        let name = util::non_blank(Some(&data.name)).ok_or(PreconditionError::Blank("class name"))?;

        let mut class = Class {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: util::non_blank(data.description.as_ref()),
            code: String::new(),
            teacher_id: teacher.id.clone(),
            teacher_name: teacher.name.clone(),
            student_count: 0,
            students: vec![],
            created_at: Utc::now(),
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            class.code = self.codes.next_code();
            if self.store.code_exists(&class.code).await? {
                tracing::debug!("Code collision on attempt {}.", attempt);
                continue;
            }
            match self.store.insert_class(&class).await {
                Ok(()) => {
                    tracing::info!("Created class '{}' with code {}.", class.name, class.code);
                    return Ok(class);
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!("Code taken concurrently on attempt {}.", attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!("No free class code after {} attempts.", MAX_CODE_ATTEMPTS);
        Err(DirectoryError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    pub async fn classes_by_teacher(&self, teacher_id: &str) -> Result<Vec<Class>, DirectoryError> {
        let mut classes = self.store.classes_by_teacher(teacher_id).await?;
        classes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(classes)
    }

    /// Case-insensitive lookup by join code.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Class>, DirectoryError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_class_by_code(&code).await?)
    }

    pub async fn find_class(&self, class_id: &str) -> Result<Class, DirectoryError> {
        self.store
            .find_class(class_id)
            .await?
            .ok_or_else(|| DirectoryError::ClassNotFound(class_id.to_string()))
    }

    /// Records `student` as a member and recounts the roster.
    ///
    /// Joining again only refreshes the membership record. A pending invite for the student's
    /// email is removed once the membership is written.
    #[tracing::instrument(skip(self, student), fields(student = %student.id))]
    pub async fn join_class(&self, class_id: &str, student: &User) -> Result<Class, DirectoryError> {
        require_approved(student)?;
        self.find_class(class_id).await?;

        self.store
            .upsert_membership(&Membership::new(class_id, student))
            .await?;
        if let Some(email) = student.email.as_ref().filter(|it| !it.trim().is_empty()) {
            self.store
                .remove_invite(class_id, &util::normalize_email(email))
                .await?;
        }

        let count = self.store.count_memberships(class_id).await?;
        self.store
            .raise_student_count(class_id, u32::try_from(count).unwrap_or(u32::MAX))
            .await?;
        tracing::info!("Joined class, {} members now.", count);

        self.find_class(class_id).await
    }

    pub async fn join_by_code(&self, code: &str, student: &User) -> Result<Class, DirectoryError> {
        let class = self
            .find_by_code(code)
            .await?
            .ok_or_else(|| DirectoryError::UnknownCode(normalize_code(code)))?;
        self.join_class(&class.id, student).await
    }

    /// Classes the student is a member of, followed by classes that invited their email.
    pub async fn classes_for_student(
        &self,
        student_id: &str,
        email: Option<&str>,
    ) -> Result<Vec<Class>, DirectoryError> {
        let joined_ids = self.store.joined_class_ids(student_id).await?;
        let mut classes = self.store.classes_by_ids(&joined_ids).await?;

        if let Some(email) = email.map(util::normalize_email).filter(|it| !it.is_empty()) {
            classes.extend(self.store.classes_inviting(&email).await?);
        }

        let mut seen = HashSet::new();
        classes.retain(|class| seen.insert(class.id.clone()));
        Ok(classes)
    }

    pub async fn students_in_class(&self, class_id: &str) -> Result<Vec<Membership>, DirectoryError> {
        let mut students = self.store.memberships(class_id).await?;
        students.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(students)
    }

    /// Pre-authorizes `email` for a class the actor manages.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn add_invite(&self, actor: &User, class_id: &str, email: &str) -> Result<Class, DirectoryError> {
        let class = self.managed_class(actor, class_id).await?;
        let email = util::normalize_email(email);
        if email.is_empty() {
            return Err(PreconditionError::Blank("email").into());
        }
        self.store.add_invite(&class.id, &email).await?;
        self.find_class(class_id).await
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn remove_invite(&self, actor: &User, class_id: &str, email: &str) -> Result<Class, DirectoryError> {
        let class = self.managed_class(actor, class_id).await?;
        self.store
            .remove_invite(&class.id, &util::normalize_email(email))
            .await?;
        self.find_class(class_id).await
    }

    /// Deletes the class together with its membership records.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_class(&self, actor: &User, class_id: &str) -> Result<(), DirectoryError> {
        let class = self.managed_class(actor, class_id).await?;
        let removed = self.store.delete_memberships(&class.id).await?;
        self.store.delete_class(&class.id).await?;
        tracing::info!("Deleted class '{}' and {} memberships.", class.name, removed);
        Ok(())
    }

    async fn managed_class(&self, actor: &User, class_id: &str) -> Result<Class, DirectoryError> {
        let caps = require_teacher(actor)?;
        let class = self.find_class(class_id).await?;
        if class.teacher_id != actor.id && !caps.is_admin {
            return Err(AccessError::Forbidden("class owner required").into());
        }
        Ok(class)
    }
}
