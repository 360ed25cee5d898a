//! Submit, grade and review flows on top of the gateway.
//!
//! Per (assignment, student) the only transitions are unsubmitted → ungraded → graded.
//! Drafts are validated locally, so a request that would break an upload bound or submit
//! nothing never leaves the process.

pub mod student;
pub mod teacher;

pub use student::StudentDesk;
pub use teacher::TeacherDesk;

use std::collections::HashMap;

use crate::config::UploadLimits;
use crate::data::assignment::Assignment;
use crate::data::class::Class;
use crate::data::submission::Submission;
use crate::data::upload::EncodedFile;
use crate::error::PreconditionError;
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkStatus {
    Unsubmitted,
    Ungraded,
    Graded,
}

impl WorkStatus {
    pub fn of(submission: Option<&Submission>) -> WorkStatus {
        match submission {
            None => WorkStatus::Unsubmitted,
            Some(it) if it.is_graded => WorkStatus::Graded,
            Some(_) => WorkStatus::Ungraded,
        }
    }
}

/// Student answer being put together before `submit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionDraft {
    pub images: Vec<EncodedFile>,
    pub text_answer: Option<String>,
}

impl SubmissionDraft {
    pub fn text(answer: impl Into<String>) -> SubmissionDraft {
        SubmissionDraft {
            images: vec![],
            text_answer: Some(answer.into()),
        }
    }

    pub fn add_image(&mut self, image: EncodedFile, limits: &UploadLimits) -> Result<(), PreconditionError> {
        if self.images.len() >= limits.max_submission_images {
            return Err(PreconditionError::TooManyImages {
                max: limits.max_submission_images,
            });
        }
        check_size(&image, limits.max_image_bytes)?;
        self.images.push(image);
        Ok(())
    }

    pub fn validate(&self, limits: &UploadLimits) -> Result<(), PreconditionError> {
        if self.images.is_empty() && util::non_blank(self.text_answer.as_ref()).is_none() {
            return Err(PreconditionError::EmptySubmission);
        }
        check_images(&self.images, limits.max_submission_images, limits.max_image_bytes)
    }
}

/// Teacher's new assignment before it's sent to the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentDraft {
    pub class_id: String,
    pub title: String,
    pub description: Option<String>,
    pub problem_text: Option<String>,
    pub due_date: Option<String>,
    pub attachment: Option<EncodedFile>,
    pub solution_images: Vec<EncodedFile>,
}

impl AssignmentDraft {
    pub fn validate(&self, limits: &UploadLimits) -> Result<(), PreconditionError> {
        if self.class_id.trim().is_empty() {
            return Err(PreconditionError::Blank("class"));
        }
        if self.title.trim().is_empty() {
            return Err(PreconditionError::Blank("title"));
        }
        if let Some(attachment) = &self.attachment {
            check_size(attachment, limits.max_attachment_bytes)?;
        }
        check_images(&self.solution_images, limits.max_solution_images, limits.max_image_bytes)
    }
}

/// Keeps the assignments of `classes`, each tagged with its class name.
pub fn tag_with_classes(classes: &[Class], assignments: Vec<Assignment>) -> Vec<Assignment> {
    let names: HashMap<&str, &str> = classes
        .iter()
        .map(|class| (class.id.as_str(), class.name.as_str()))
        .collect();

    assignments
        .into_iter()
        .filter_map(|mut assignment| {
            let name = names.get(assignment.class_id.as_str())?;
            assignment.class_name = Some(name.to_string());
            Some(assignment)
        })
        .collect()
}

fn check_size(file: &EncodedFile, limit: usize) -> Result<(), PreconditionError> {
    if file.size > limit {
        return Err(PreconditionError::FileTooLarge {
            name: file.name.clone(),
            size: file.size,
            limit,
        });
    }
    Ok(())
}

fn check_images(images: &[EncodedFile], max: usize, limit: usize) -> Result<(), PreconditionError> {
    if images.len() > max {
        return Err(PreconditionError::TooManyImages { max });
    }
    images.iter().try_for_each(|image| check_size(image, limit))
}
