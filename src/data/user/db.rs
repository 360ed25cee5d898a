use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use super::{User, USER_COLLECTION_NAME};
use crate::data::{filter, is_duplicate_key};
use crate::error::StoreError;
use crate::role::Role;

/// Profile records (`users/{id}`).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn has_users(&self) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::Conflict`] if a profile with the same id exists.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Returns `false` when no profile matched.
    async fn set_approved(&self, id: &str, approved: bool) -> Result<bool, StoreError>;

    async fn set_role(&self, id: &str, role: Role) -> Result<bool, StoreError>;

    async fn delete_user(&self, id: &str) -> Result<Option<User>, StoreError>;
}

fn users(db: &Database) -> Collection<User> {
    db.collection(USER_COLLECTION_NAME)
}

#[async_trait]
impl UserStore for Database {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(users(self).find_one(filter::by_id(id), None).await?)
    }

    async fn has_users(&self) -> Result<bool, StoreError> {
        Ok(users(self).find_one(doc! {}, None).await?.is_some())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        match users(self).insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict(format!("user '{}'", user.id))),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let cursor = users(self).find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_approved(&self, id: &str, approved: bool) -> Result<bool, StoreError> {
        let result = users(self)
            .update_one(filter::by_id(id), doc! { "$set": { "isApproved": approved } }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<bool, StoreError> {
        let result = users(self)
            .update_one(filter::by_id(id), doc! { "$set": { "role": role.as_str() } }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(users(self).find_one_and_delete(filter::by_id(id), None).await?)
    }
}
