//! # 内存存储
//!
//! 进程内实现，供测试与嵌入式场景使用

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{EntityStore, GroupStore, UserStore, role_allowed};
use crate::auth::permissions::Role;
use crate::auth::types::{
    EntityRules, Group, GroupUpdate, NewUser, User, UserChanges, Username,
};
use crate::error::{AppError, AuthError, Result};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i32, User>,
    next_user_id: i32,
    groups: BTreeMap<String, Group>,
    entities: BTreeMap<String, EntityRules>,
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// 创建空存储
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入用户（保留其 ID）
    pub async fn insert_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.next_user_id = inner.next_user_id.max(user.id);
        inner.users.insert(user.id, user);
    }

    /// 用户数量
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
        allowed_roles: Option<&[Role]>,
    ) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.matches_username(username) && role_allowed(user.role, allowed_roles))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;

        let duplicate = inner.users.values().any(|existing| {
            (user.email.is_some() && existing.email == user.email)
                || (user.mobile_number.is_some() && existing.mobile_number == user.mobile_number)
        });
        if duplicate {
            return Err(AppError::database("用户邮箱或手机号已存在"));
        }

        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            email: user.email,
            mobile_number: user.mobile_number,
            hashed_password: user.hashed_password,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            role: user.role,
            groups: user.groups,
            permissions: user.permissions,
            is_enable: true,
            is_blocked: false,
            is_force_login: false,
            is_force_change_password: false,
            email_verified: user.email_verified,
            phone_verified: user.phone_verified,
            user_status: user.user_status,
            login_type: user.login_type,
            login_datetime: None,
            last_login_datetime: None,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<User> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        changes.apply_to(user);
        Ok(user.clone())
    }

    async fn count_users_in_groups(&self, names: &[String]) -> Result<HashMap<String, u64>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for user in inner.users.values() {
            for group in user.groups.iter().filter(|group| names.contains(group)) {
                *counts.entry(group.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn find_groups(&self, names: &[String]) -> Result<Vec<Group>> {
        let inner = self.inner.read().await;
        Ok(names
            .iter()
            .filter_map(|name| inner.groups.get(name).cloned())
            .collect())
    }

    async fn find_group(&self, name: &str) -> Result<Option<Group>> {
        Ok(self.inner.read().await.groups.get(name).cloned())
    }

    async fn create_group(&self, group: Group) -> Result<Group> {
        let mut inner = self.inner.write().await;
        if inner.groups.contains_key(&group.name) {
            return Err(AuthError::GroupExists(group.name).into());
        }
        inner.groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }

    async fn update_group(&self, name: &str, update: GroupUpdate) -> Result<Group> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .get_mut(name)
            .ok_or_else(|| AuthError::GroupNotFound(name.to_string()))?;

        if let Some(description) = update.description {
            group.description = Some(description);
        }
        if let Some(permissions) = update.permissions {
            group.permissions = permissions;
        }
        if let Some(is_enable) = update.is_enable {
            group.is_enable = is_enable;
        }
        Ok(group.clone())
    }

    async fn delete_groups(&self, names: &[String]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let removed = names
            .iter()
            .filter(|name| inner.groups.remove(*name).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_entity(&self, code_name: &str) -> Result<Option<EntityRules>> {
        Ok(self.inner.read().await.entities.get(code_name).cloned())
    }

    async fn list_entities(&self) -> Result<Vec<EntityRules>> {
        Ok(self.inner.read().await.entities.values().cloned().collect())
    }

    async fn upsert_entity(&self, entity: EntityRules) -> Result<()> {
        self.inner
            .write()
            .await
            .entities
            .insert(entity.code_name.clone(), entity);
        Ok(())
    }
}
