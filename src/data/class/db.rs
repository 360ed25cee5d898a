use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{Collection, Database, IndexModel};

use super::{Class, Membership, CLASS_COLLECTION_NAME, MEMBERSHIP_COLLECTION_NAME};
use crate::data::{filter, is_duplicate_key};
use crate::error::StoreError;

/// Classes (`classes/{id}`) and their membership records (`classes/{id}/students/{studentId}`).
#[async_trait]
pub trait ClassStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the id or the join code is taken.
    async fn insert_class(&self, class: &Class) -> Result<(), StoreError>;

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn find_class(&self, id: &str) -> Result<Option<Class>, StoreError>;

    async fn find_class_by_code(&self, code: &str) -> Result<Option<Class>, StoreError>;

    async fn classes_by_teacher(&self, teacher_id: &str) -> Result<Vec<Class>, StoreError>;

    /// Classes with the given ids, in the order of `ids`. Missing ids are skipped.
    async fn classes_by_ids(&self, ids: &[String]) -> Result<Vec<Class>, StoreError>;

    /// Classes whose invite list contains `email`.
    async fn classes_inviting(&self, email: &str) -> Result<Vec<Class>, StoreError>;

    async fn delete_class(&self, id: &str) -> Result<bool, StoreError>;

    async fn add_invite(&self, class_id: &str, email: &str) -> Result<bool, StoreError>;

    async fn remove_invite(&self, class_id: &str, email: &str) -> Result<bool, StoreError>;

    /// Raises the stored count to `count`. A lower count never overwrites a higher one, so the
    /// recount taken after the last membership write wins regardless of write order.
    async fn raise_student_count(&self, class_id: &str, count: u32) -> Result<(), StoreError>;

    /// Creates or overwrites the (class, student) record.
    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError>;

    async fn memberships(&self, class_id: &str) -> Result<Vec<Membership>, StoreError>;

    async fn count_memberships(&self, class_id: &str) -> Result<u64, StoreError>;

    /// Ids of classes the student has a membership record in, oldest join first.
    async fn joined_class_ids(&self, student_id: &str) -> Result<Vec<String>, StoreError>;

    async fn delete_memberships(&self, class_id: &str) -> Result<u64, StoreError>;
}

fn classes(db: &Database) -> Collection<Class> {
    db.collection(CLASS_COLLECTION_NAME)
}

fn memberships(db: &Database) -> Collection<Membership> {
    db.collection(MEMBERSHIP_COLLECTION_NAME)
}

/// Unique join codes and membership lookups by student.
pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    let unique_code = IndexModel::builder()
        .keys(doc! { "code": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    classes(db).create_index(unique_code, None).await?;

    let invites = IndexModel::builder().keys(doc! { "students": 1 }).build();
    classes(db).create_index(invites, None).await?;

    let by_student = IndexModel::builder()
        .keys(doc! { "studentId": 1, "joinedAt": 1 })
        .build();
    memberships(db).create_index(by_student, None).await?;

    Ok(())
}

#[async_trait]
impl ClassStore for Database {
    async fn insert_class(&self, class: &Class) -> Result<(), StoreError> {
        match classes(self).insert_one(class, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::Conflict(format!("class code '{}'", class.code)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(classes(self).count_documents(filter::by_code(code), None).await? > 0)
    }

    async fn find_class(&self, id: &str) -> Result<Option<Class>, StoreError> {
        Ok(classes(self).find_one(filter::by_id(id), None).await?)
    }

    async fn find_class_by_code(&self, code: &str) -> Result<Option<Class>, StoreError> {
        Ok(classes(self).find_one(filter::by_code(code), None).await?)
    }

    async fn classes_by_teacher(&self, teacher_id: &str) -> Result<Vec<Class>, StoreError> {
        let cursor = classes(self).find(filter::by_teacher(teacher_id), None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn classes_by_ids(&self, ids: &[String]) -> Result<Vec<Class>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = classes(self).find(filter::by_ids(ids), None).await?;
        let mut found: Vec<Class> = cursor.try_collect().await?;

        found.sort_by_key(|class| ids.iter().position(|id| *id == class.id));
        Ok(found)
    }

    async fn classes_inviting(&self, email: &str) -> Result<Vec<Class>, StoreError> {
        let cursor = classes(self).find(filter::by_invite(email), None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_class(&self, id: &str) -> Result<bool, StoreError> {
        let result = classes(self).delete_one(filter::by_id(id), None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn add_invite(&self, class_id: &str, email: &str) -> Result<bool, StoreError> {
        let result = classes(self)
            .update_one(
                filter::by_id(class_id),
                doc! { "$addToSet": { "students": email } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_invite(&self, class_id: &str, email: &str) -> Result<bool, StoreError> {
        let result = classes(self)
            .update_one(
                filter::by_id(class_id),
                doc! { "$pull": { "students": email } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn raise_student_count(&self, class_id: &str, count: u32) -> Result<(), StoreError> {
        classes(self)
            .update_one(
                filter::by_id(class_id),
                doc! { "$max": { "studentCount": count } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        let key = Membership::key(&membership.class_id, &membership.id);
        let mut document: Document = bson::to_document(membership)?;
        document.insert("_id", key.as_str());

        self.collection::<Document>(MEMBERSHIP_COLLECTION_NAME)
            .replace_one(
                filter::by_id(&key),
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn memberships(&self, class_id: &str) -> Result<Vec<Membership>, StoreError> {
        let cursor = memberships(self).find(filter::by_class(class_id), None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_memberships(&self, class_id: &str) -> Result<u64, StoreError> {
        Ok(memberships(self)
            .count_documents(filter::by_class(class_id), None)
            .await?)
    }

    async fn joined_class_ids(&self, student_id: &str) -> Result<Vec<String>, StoreError> {
        let cursor = memberships(self)
            .find(
                filter::by_student(student_id),
                mongodb::options::FindOptions::builder()
                    .sort(doc! { "joinedAt": 1 })
                    .build(),
            )
            .await?;
        let joined: Vec<Membership> = cursor.try_collect().await?;
        Ok(joined.into_iter().map(|it| it.class_id).collect())
    }

    async fn delete_memberships(&self, class_id: &str) -> Result<u64, StoreError> {
        let result = memberships(self)
            .delete_many(filter::by_class(class_id), None)
            .await?;
        Ok(result.deleted_count)
    }
}
