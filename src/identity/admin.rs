//! User administration for admins and leaders.

use std::sync::Arc;

use crate::access::require_admin;
use crate::data::user::User;
use crate::error::{DirectoryError, StoreError};
use crate::role::Role;
use crate::store::UserStore;

pub struct UserAdmin {
    store: Arc<dyn UserStore>,
}

impl UserAdmin {
    pub fn new(store: Arc<dyn UserStore>) -> UserAdmin {
        UserAdmin { store }
    }

    /// All profiles, pending ones first, then by name.
    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, DirectoryError> {
        require_admin(actor)?;
        let mut users = self.store.list_users().await?;
        users.sort_by(|a, b| {
            a.is_approved
                .cmp(&b.is_approved)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(users)
    }

    pub async fn pending_users(&self, actor: &User) -> Result<Vec<User>, DirectoryError> {
        Ok(self
            .list_users(actor)
            .await?
            .into_iter()
            .filter(|user| !user.is_approved)
            .collect())
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn approve(&self, actor: &User, user_id: &str) -> Result<(), DirectoryError> {
        require_admin(actor)?;
        if !self.store.set_approved(user_id, true).await? {
            return Err(not_found(user_id));
        }
        tracing::info!("Approved user.");
        Ok(())
    }

    /// Rejection deletes the profile outright.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn reject(&self, actor: &User, user_id: &str) -> Result<User, DirectoryError> {
        require_admin(actor)?;
        let removed = self
            .store
            .delete_user(user_id)
            .await?
            .ok_or_else(|| not_found(user_id))?;
        tracing::info!("Rejected and removed user.");
        Ok(removed)
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn set_role(&self, actor: &User, user_id: &str, role: Role) -> Result<(), DirectoryError> {
        require_admin(actor)?;
        if !self.store.set_role(user_id, role).await? {
            return Err(not_found(user_id));
        }
        tracing::info!("Changed role to {}.", role);
        Ok(())
    }
}

fn not_found(user_id: &str) -> DirectoryError {
    StoreError::NotFound(format!("user '{}'", user_id)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::identity::profile::resolve_profile;
    use crate::identity::provider::fake::account;
    use crate::store::MemoryStore;

    async fn seeded() -> (Arc<MemoryStore>, User, User) {
        let store = Arc::new(MemoryStore::new());
        let admin = resolve_profile(store.as_ref(), &account("u1", "Ana", "ana@school.edu"))
            .await
            .unwrap();
        let student = resolve_profile(store.as_ref(), &account("u2", "Bao", "bao@school.edu"))
            .await
            .unwrap();
        (store, admin, student)
    }

    #[tokio::test]
    async fn admin_approves_and_promotes() {
        let (store, admin, student) = seeded().await;
        let users = UserAdmin::new(store.clone());

        assert_eq!(users.pending_users(&admin).await.unwrap(), vec![student.clone()]);
        users.approve(&admin, &student.id).await.unwrap();
        users.set_role(&admin, &student.id, Role::Teacher).await.unwrap();

        let updated = store.get_user(&student.id).await.unwrap().unwrap();
        assert!(updated.is_approved);
        assert_eq!(updated.role, Role::Teacher);
        assert!(users.pending_users(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reject_deletes_the_profile() {
        let (store, admin, student) = seeded().await;
        let users = UserAdmin::new(store.clone());

        users.reject(&admin, &student.id).await.unwrap();
        assert_eq!(store.get_user(&student.id).await.unwrap(), None);
        assert!(matches!(
            users.reject(&admin, &student.id).await,
            Err(DirectoryError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn non_admins_are_refused() {
        let (store, _, student) = seeded().await;
        let users = UserAdmin::new(store);

        assert!(matches!(
            users.list_users(&student).await,
            Err(DirectoryError::Access(AccessError::PendingApproval))
        ));
    }
}
