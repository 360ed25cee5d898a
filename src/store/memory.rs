use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::data::class::{Class, Membership};
use crate::data::settings::GatewaySettings;
use crate::data::user::User;
use crate::error::StoreError;
use crate::role::Role;
use crate::store::{ClassStore, SettingsStore, UserStore};

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<String, User>,
    classes: Vec<Class>,
    memberships: Vec<Membership>,
    gateway: Option<GatewaySettings>,
    bootstrap: Option<String>,
    offline: bool,
}

/// In-process document store with the same contract as the MongoDB implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.lock_unchecked().offline = offline;
    }

    fn lock_unchecked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock_unchecked();
        if inner.offline {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(inner)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    async fn has_users(&self) -> Result<bool, StoreError> {
        Ok(!self.lock()?.users.is_empty())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user '{}'", user.id)));
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn set_approved(&self, id: &str, approved: bool) -> Result<bool, StoreError> {
        Ok(match self.lock()?.users.get_mut(id) {
            Some(user) => {
                user.is_approved = approved;
                true
            }
            None => false,
        })
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<bool, StoreError> {
        Ok(match self.lock()?.users.get_mut(id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.remove(id))
    }
}

#[async_trait]
impl ClassStore for MemoryStore {
    async fn insert_class(&self, class: &Class) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.classes.iter().any(|it| it.id == class.id) {
            return Err(StoreError::Conflict(format!("class '{}'", class.id)));
        }
        if inner.classes.iter().any(|it| it.code == class.code) {
            return Err(StoreError::Conflict(format!("class code '{}'", class.code)));
        }
        inner.classes.push(class.clone());
        Ok(())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.classes.iter().any(|it| it.code == code))
    }

    async fn find_class(&self, id: &str) -> Result<Option<Class>, StoreError> {
        Ok(self.lock()?.classes.iter().find(|it| it.id == id).cloned())
    }

    async fn find_class_by_code(&self, code: &str) -> Result<Option<Class>, StoreError> {
        Ok(self.lock()?.classes.iter().find(|it| it.code == code).cloned())
    }

    async fn classes_by_teacher(&self, teacher_id: &str) -> Result<Vec<Class>, StoreError> {
        Ok(self
            .lock()?
            .classes
            .iter()
            .filter(|it| it.teacher_id == teacher_id)
            .cloned()
            .collect())
    }

    async fn classes_by_ids(&self, ids: &[String]) -> Result<Vec<Class>, StoreError> {
        let inner = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.classes.iter().find(|it| it.id == *id).cloned())
            .collect())
    }

    async fn classes_inviting(&self, email: &str) -> Result<Vec<Class>, StoreError> {
        Ok(self
            .lock()?
            .classes
            .iter()
            .filter(|it| it.is_invited(email))
            .cloned()
            .collect())
    }

    async fn delete_class(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.classes.len();
        inner.classes.retain(|it| it.id != id);
        Ok(inner.classes.len() != before)
    }

    async fn add_invite(&self, class_id: &str, email: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(match inner.classes.iter_mut().find(|it| it.id == class_id) {
            Some(class) => {
                if !class.is_invited(email) {
                    class.students.push(email.to_string());
                }
                true
            }
            None => false,
        })
    }

    async fn remove_invite(&self, class_id: &str, email: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(match inner.classes.iter_mut().find(|it| it.id == class_id) {
            Some(class) => {
                class.students.retain(|it| it != email);
                true
            }
            None => false,
        })
    }

    async fn raise_student_count(&self, class_id: &str, count: u32) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(class) = inner.classes.iter_mut().find(|it| it.id == class_id) {
            class.student_count = class.student_count.max(count);
        }
        Ok(())
    }

    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let existing = inner
            .memberships
            .iter()
            .position(|it| it.class_id == membership.class_id && it.id == membership.id);
        match existing {
            Some(index) => inner.memberships[index] = membership.clone(),
            None => inner.memberships.push(membership.clone()),
        }
        Ok(())
    }

    async fn memberships(&self, class_id: &str) -> Result<Vec<Membership>, StoreError> {
        Ok(self
            .lock()?
            .memberships
            .iter()
            .filter(|it| it.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn count_memberships(&self, class_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .memberships
            .iter()
            .filter(|it| it.class_id == class_id)
            .count() as u64)
    }

    async fn joined_class_ids(&self, student_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .memberships
            .iter()
            .filter(|it| it.id == student_id)
            .map(|it| it.class_id.clone())
            .collect())
    }

    async fn delete_memberships(&self, class_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.memberships.len();
        inner.memberships.retain(|it| it.class_id != class_id);
        Ok((before - inner.memberships.len()) as u64)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn gateway_settings(&self) -> Result<Option<GatewaySettings>, StoreError> {
        Ok(self.lock()?.gateway.clone())
    }

    async fn put_gateway_settings(&self, settings: &GatewaySettings) -> Result<(), StoreError> {
        self.lock()?.gateway = Some(settings.clone());
        Ok(())
    }

    async fn claim_bootstrap(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if let Some(owner) = inner.bootstrap.as_deref() {
            return Ok(owner == user_id);
        }
        inner.bootstrap = Some(user_id.to_string());
        Ok(true)
    }

    async fn bootstrap_owner(&self) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.bootstrap.clone())
    }
}
