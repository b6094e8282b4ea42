//! # 数据库存储
//!
//! 基于 Sea-ORM 的用户、分组、实体目录存储

use async_trait::async_trait;
use chrono::Utc;
use entity::{entities, groups, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;

use super::{EntityStore, GroupStore, UserStore};
use crate::auth::permissions::Role;
use crate::auth::types::{
    EntityRules, Group, GroupUpdate, LoginType, NewUser, User, UserChanges, UserStatus, Username,
};
use crate::error::{AppError, AuthError, Result};

fn from_json<T: DeserializeOwned>(value: serde_json::Value, column: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| AppError::serialization(format!("无法解析 JSON 列 {column}"), e))
}

fn to_json<T: Serialize + ?Sized>(value: &T, column: &str) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::serialization(format!("无法序列化 JSON 列 {column}"), e))
}

fn user_from_model(model: users::Model) -> Result<User> {
    let role = Role::parse(&model.role)
        .ok_or_else(|| AppError::database(format!("用户 {} 的角色无效: {}", model.id, model.role)))?;
    let user_status = UserStatus::parse(&model.user_status).ok_or_else(|| {
        AppError::database(format!("用户 {} 的状态无效: {}", model.id, model.user_status))
    })?;
    let login_type = LoginType::parse(&model.login_type).ok_or_else(|| {
        AppError::database(format!("用户 {} 的登录方式无效: {}", model.id, model.login_type))
    })?;

    Ok(User {
        id: model.id,
        email: model.email,
        mobile_number: model.mobile_number,
        hashed_password: model.hashed_password,
        first_name: model.first_name,
        last_name: model.last_name,
        avatar: model.avatar,
        role,
        groups: from_json(model.groups, "users.groups")?,
        permissions: from_json(model.permissions, "users.permissions")?,
        is_enable: model.is_enable,
        is_blocked: model.is_blocked,
        is_force_login: model.is_force_login,
        is_force_change_password: model.is_force_change_password,
        email_verified: model.email_verified,
        phone_verified: model.phone_verified,
        user_status,
        login_type,
        login_datetime: model.login_datetime.map(|dt| dt.and_utc()),
        last_login_datetime: model.last_login_datetime.map(|dt| dt.and_utc()),
    })
}

fn group_from_model(model: groups::Model) -> Result<Group> {
    Ok(Group {
        name: model.name,
        description: model.description,
        permissions: from_json(model.permissions, "groups.permissions")?,
        is_enable: model.is_enable,
    })
}

fn entity_from_model(model: entities::Model) -> Result<EntityRules> {
    Ok(EntityRules {
        code_name: model.code_name,
        valid_rules: from_json(model.rules, "entities.rules")?,
    })
}

/// 数据库存储
#[derive(Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    /// 包装数据库连接
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 底层连接
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_user_model(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("查询用户失败: {id}"), e))
    }
}

#[async_trait]
impl UserStore for DatabaseStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        self.find_user_model(id)
            .await?
            .map(user_from_model)
            .transpose()
    }

    async fn find_by_username(
        &self,
        username: &Username,
        allowed_roles: Option<&[Role]>,
    ) -> Result<Option<User>> {
        let mut condition = Condition::all().add(match username {
            Username::Email(email) => users::Column::Email.eq(email.as_str()),
            Username::Phone(phone) => users::Column::MobileNumber.eq(phone.as_str()),
        });
        if let Some(roles) = allowed_roles {
            condition = condition.add(users::Column::Role.is_in(roles.iter().map(Role::as_str)));
        }

        users::Entity::find()
            .filter(condition)
            .one(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("查询用户失败: {username}"), e))?
            .map(user_from_model)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("查询用户失败: {email}"), e))?
            .map(user_from_model)
            .transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let now = Utc::now().naive_utc();
        let model = users::ActiveModel {
            email: Set(user.email),
            mobile_number: Set(user.mobile_number),
            hashed_password: Set(user.hashed_password),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            avatar: Set(user.avatar),
            role: Set(user.role.as_str().to_string()),
            groups: Set(to_json(&user.groups, "users.groups")?),
            permissions: Set(to_json(&user.permissions, "users.permissions")?),
            is_enable: Set(true),
            is_blocked: Set(false),
            is_force_login: Set(false),
            is_force_change_password: Set(false),
            email_verified: Set(user.email_verified),
            phone_verified: Set(user.phone_verified),
            user_status: Set(user.user_status.as_str().to_string()),
            login_type: Set(user.login_type.as_str().to_string()),
            login_datetime: Set(None),
            last_login_datetime: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = model
            .insert(&self.db)
            .await
            .map_err(|e| AppError::database_with_source("创建用户失败", e))?;
        user_from_model(inserted)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<User> {
        let model = self
            .find_user_model(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let mut active = model.into_active_model();

        if let Some(stamp) = changes.login {
            active.login_datetime = Set(Some(stamp.at.naive_utc()));
            active.last_login_datetime = Set(stamp.previous.map(|dt| dt.naive_utc()));
        }
        if let Some(value) = changes.is_force_login {
            active.is_force_login = Set(value);
        }
        if let Some(value) = changes.is_force_change_password {
            active.is_force_change_password = Set(value);
        }
        if let Some(value) = changes.email_verified {
            active.email_verified = Set(value);
        }
        if let Some(value) = changes.phone_verified {
            active.phone_verified = Set(value);
        }
        if let Some(hash) = changes.hashed_password {
            active.hashed_password = Set(Some(hash));
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let updated = active
            .update(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("更新用户失败: {id}"), e))?;
        user_from_model(updated)
    }

    async fn count_users_in_groups(&self, names: &[String]) -> Result<HashMap<String, u64>> {
        // 分组保存在 JSON 列中，在应用层计数
        let models = users::Entity::find()
            .all(&self.db)
            .await
            .map_err(|e| AppError::database_with_source("查询用户分组失败", e))?;

        let mut counts = HashMap::new();
        for model in models {
            let groups: Vec<String> = from_json(model.groups, "users.groups")?;
            for group in groups.into_iter().filter(|group| names.contains(group)) {
                *counts.entry(group).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl GroupStore for DatabaseStore {
    async fn find_groups(&self, names: &[String]) -> Result<Vec<Group>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        groups::Entity::find()
            .filter(groups::Column::Name.is_in(names.iter().map(String::as_str)))
            .all(&self.db)
            .await
            .map_err(|e| AppError::database_with_source("查询分组失败", e))?
            .into_iter()
            .map(group_from_model)
            .collect()
    }

    async fn find_group(&self, name: &str) -> Result<Option<Group>> {
        groups::Entity::find()
            .filter(groups::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("查询分组失败: {name}"), e))?
            .map(group_from_model)
            .transpose()
    }

    async fn create_group(&self, group: Group) -> Result<Group> {
        if self.find_group(&group.name).await?.is_some() {
            return Err(AuthError::GroupExists(group.name).into());
        }

        let now = Utc::now().naive_utc();
        let model = groups::ActiveModel {
            name: Set(group.name.clone()),
            description: Set(group.description.clone()),
            permissions: Set(to_json(&group.permissions, "groups.permissions")?),
            is_enable: Set(group.is_enable),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = model
            .insert(&self.db)
            .await
            .map_err(|e| AppError::database_with_source("创建分组失败", e))?;
        group_from_model(inserted)
    }

    async fn update_group(&self, name: &str, update: GroupUpdate) -> Result<Group> {
        let model = groups::Entity::find()
            .filter(groups::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("查询分组失败: {name}"), e))?
            .ok_or_else(|| AuthError::GroupNotFound(name.to_string()))?;
        let mut active = model.into_active_model();

        if let Some(description) = update.description {
            active.description = Set(Some(description));
        }
        if let Some(permissions) = update.permissions {
            active.permissions = Set(to_json(&permissions, "groups.permissions")?);
        }
        if let Some(is_enable) = update.is_enable {
            active.is_enable = Set(is_enable);
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let updated = active
            .update(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("更新分组失败: {name}"), e))?;
        group_from_model(updated)
    }

    async fn delete_groups(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let result = groups::Entity::delete_many()
            .filter(groups::Column::Name.is_in(names.iter().map(String::as_str)))
            .exec(&self.db)
            .await
            .map_err(|e| AppError::database_with_source("删除分组失败", e))?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl EntityStore for DatabaseStore {
    async fn find_entity(&self, code_name: &str) -> Result<Option<EntityRules>> {
        entities::Entity::find()
            .filter(entities::Column::CodeName.eq(code_name))
            .one(&self.db)
            .await
            .map_err(|e| AppError::database_with_source(format!("查询实体失败: {code_name}"), e))?
            .map(entity_from_model)
            .transpose()
    }

    async fn list_entities(&self) -> Result<Vec<EntityRules>> {
        entities::Entity::find()
            .all(&self.db)
            .await
            .map_err(|e| AppError::database_with_source("查询实体目录失败", e))?
            .into_iter()
            .map(entity_from_model)
            .collect()
    }

    async fn upsert_entity(&self, entity: EntityRules) -> Result<()> {
        let rules = to_json(&entity.valid_rules, "entities.rules")?;
        let existing = entities::Entity::find()
            .filter(entities::Column::CodeName.eq(entity.code_name.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| {
                AppError::database_with_source(format!("查询实体失败: {}", entity.code_name), e)
            })?;

        match existing {
            Some(model) => {
                let mut active = model.into_active_model();
                active.rules = Set(rules);
                active
                    .update(&self.db)
                    .await
                    .map_err(|e| AppError::database_with_source("更新实体失败", e))?;
            }
            None => {
                entities::ActiveModel {
                    code_name: Set(entity.code_name),
                    rules: Set(rules),
                    created_at: Set(Utc::now().naive_utc()),
                    ..Default::default()
                }
                .insert(&self.db)
                .await
                .map_err(|e| AppError::database_with_source("创建实体失败", e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{LoginStamp, Permission};
    use crate::config::DatabaseConfig;
    use crate::database::{init_database, run_migrations};

    async fn store() -> DatabaseStore {
        let db = init_database(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..DatabaseConfig::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        DatabaseStore::new(db)
    }

    #[tokio::test]
    async fn test_seeded_catalog_and_groups() {
        let store = store().await;

        let files = store.find_entity("files").await.unwrap().unwrap();
        assert!(files.valid_rules.contains("delete"));
        let users = store.find_entity("users").await.unwrap().unwrap();
        assert!(users.valid_rules.contains("change_password"));

        let customer = store.find_group("customer").await.unwrap().unwrap();
        assert!(customer.is_enable);
        assert!(customer
            .permissions
            .iter()
            .any(|permission| permission.entity == "products"));

        let found = store
            .find_groups(&["audit".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_user_round_trip_and_update() {
        let store = store().await;
        let username = Username::parse("+989123456789").unwrap();

        let created = store.create_user(NewUser::customer(&username)).await.unwrap();
        assert_eq!(created.role, Role::Customer);
        assert_eq!(created.groups, vec!["customer".to_string()]);

        let found = store
            .find_by_username(&username, Some(&[Role::Customer]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(store
            .find_by_username(&username, Some(&[Role::Admin]))
            .await
            .unwrap()
            .is_none());

        let at = Utc::now();
        let updated = store
            .update_user(
                created.id,
                UserChanges {
                    login: Some(LoginStamp { at, previous: None }),
                    is_force_login: Some(true),
                    phone_verified: Some(true),
                    ..UserChanges::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_force_login);
        assert!(updated.phone_verified);
        assert_eq!(
            updated.login_datetime.map(|dt| dt.timestamp()),
            Some(at.timestamp())
        );

        let counts = store
            .count_users_in_groups(&["customer".to_string()])
            .await
            .unwrap();
        assert_eq!(counts.get("customer"), Some(&1));
    }

    #[tokio::test]
    async fn test_group_crud() {
        let store = store().await;
        let group = Group::new("editors", vec![Permission::new("blogs", ["create", "update"])]);

        store.create_group(group.clone()).await.unwrap();
        let err = store.create_group(group).await.unwrap_err();
        assert_eq!(
            err.as_auth(),
            Some(&AuthError::GroupExists("editors".to_string()))
        );

        let updated = store
            .update_group(
                "editors",
                GroupUpdate {
                    description: Some("Blog editors".to_string()),
                    ..GroupUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Blog editors"));

        assert_eq!(
            store.delete_groups(&["editors".to_string()]).await.unwrap(),
            1
        );
        assert!(store.find_group("editors").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_entity_replaces_rules() {
        let store = store().await;
        store
            .upsert_entity(EntityRules::new("reviews", ["list", "read"]))
            .await
            .unwrap();
        store
            .upsert_entity(EntityRules::new("reviews", ["list", "read", "approve"]))
            .await
            .unwrap();

        let reviews = store.find_entity("reviews").await.unwrap().unwrap();
        assert!(reviews.valid_rules.contains("approve"));
    }
}
