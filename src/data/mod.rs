//! Entities from both backends and their document-store bindings.
//!
//! Users, classes, memberships and settings live in MongoDB and each module has a `db`
//! submodule implementing its store trait for [`mongodb::Database`]. Assignments, submissions
//! and API keys are owned by the gateway and only ever travel over the wire.

pub mod api_key;
pub mod assignment;
pub mod class;
pub mod settings;
pub mod submission;
pub mod upload;
pub mod user;

pub(crate) mod filter {
    use bson::{doc, Document};

    #[inline]
    pub fn by_id(id: impl AsRef<str>) -> Document {
        doc! { "_id": id.as_ref() }
    }

    #[inline]
    pub fn by_ids(ids: &[String]) -> Document {
        doc! { "_id": { "$in": ids.to_vec() } }
    }

    #[inline]
    pub fn by_code(code: impl AsRef<str>) -> Document {
        doc! { "code": code.as_ref() }
    }

    #[inline]
    pub fn by_teacher(teacher_id: impl AsRef<str>) -> Document {
        doc! { "teacherId": teacher_id.as_ref() }
    }

    #[inline]
    pub fn by_invite(email: impl AsRef<str>) -> Document {
        doc! { "students": email.as_ref() }
    }

    #[inline]
    pub fn by_class(class_id: impl AsRef<str>) -> Document {
        doc! { "classId": class_id.as_ref() }
    }

    #[inline]
    pub fn by_student(student_id: impl AsRef<str>) -> Document {
        doc! { "studentId": student_id.as_ref() }
    }
}

/// Whether a MongoDB failure is a unique index violation.
pub(crate) fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    const DUPLICATE_KEY: i32 = 11000;

    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        _ => false,
    }
}
