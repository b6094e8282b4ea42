//! # 分组管理
//!
//! 分组的创建、更新与删除；权限规则必须来自实体目录

use std::sync::Arc;

use crate::auth::permissions::PermissionResolver;
use crate::auth::types::{Group, GroupUpdate};
use crate::error::{AuthError, Result};
use crate::store::{GroupStore, UserStore};
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 删除分组的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteGroupsOutcome {
    /// 已删除的数量
    pub deleted: u64,
}

/// 分组服务
pub struct GroupService {
    groups: Arc<dyn GroupStore>,
    users: Arc<dyn UserStore>,
    resolver: Arc<PermissionResolver>,
}

impl GroupService {
    /// 创建分组服务
    pub fn new(
        groups: Arc<dyn GroupStore>,
        users: Arc<dyn UserStore>,
        resolver: Arc<PermissionResolver>,
    ) -> Self {
        Self {
            groups,
            users,
            resolver,
        }
    }

    /// 创建分组
    pub async fn create_group(&self, group: Group) -> Result<Group> {
        self.resolver
            .validate_permissions(&group.permissions)
            .await?;
        let created = self.groups.create_group(group).await?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::Group,
            "group_created",
            &format!("分组已创建: {}", created.name)
        );
        Ok(created)
    }

    /// 更新分组
    pub async fn update_group(&self, name: &str, update: GroupUpdate) -> Result<Group> {
        if let Some(permissions) = &update.permissions {
            self.resolver.validate_permissions(permissions).await?;
        }
        let updated = self.groups.update_group(name, update).await?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::Group,
            "group_updated",
            &format!("分组已更新: {name}")
        );
        Ok(updated)
    }

    /// 删除分组；仍有用户的分组保留并以 `GroupsHaveUser` 报告
    pub async fn delete_groups(&self, names: &[String]) -> Result<DeleteGroupsOutcome> {
        let counts = self.users.count_users_in_groups(names).await?;

        let (in_use, removable): (Vec<String>, Vec<String>) = names
            .iter()
            .cloned()
            .partition(|name| counts.get(name).copied().unwrap_or(0) > 0);

        let deleted = self.groups.delete_groups(&removable).await?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::Group,
            "groups_deleted",
            &format!("已删除 {deleted} 个分组，保留 {} 个", in_use.len())
        );

        if in_use.is_empty() {
            Ok(DeleteGroupsOutcome { deleted })
        } else {
            Err(AuthError::GroupsHaveUser { groups: in_use }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{EntityRules, Permission};
    use crate::store::{EntityStore, MemoryStore};
    use crate::testing::UserFixture;

    async fn setup() -> (GroupService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_entity(EntityRules::new("files", ["list", "read", "delete"]))
            .await
            .unwrap();
        let resolver = Arc::new(PermissionResolver::new(store.clone(), store.clone()));
        (
            GroupService::new(store.clone(), store.clone(), resolver),
            store,
        )
    }

    #[tokio::test]
    async fn test_create_group_validates_rules() {
        let (service, _) = setup().await;

        service
            .create_group(Group::new("readers", vec![Permission::new("files", ["read"])]))
            .await
            .unwrap();

        let err = service
            .create_group(Group::new("bad", vec![Permission::new("files", ["burn"])]))
            .await
            .unwrap_err();
        assert_eq!(
            err.as_auth(),
            Some(&AuthError::InvalidRules {
                entity: "files".to_string(),
                rules: vec!["burn".to_string()]
            })
        );
    }

    #[tokio::test]
    async fn test_update_group_validates_rules() {
        let (service, _) = setup().await;
        service
            .create_group(Group::new("readers", vec![]))
            .await
            .unwrap();

        let err = service
            .update_group(
                "readers",
                GroupUpdate {
                    permissions: Some(vec![Permission::new("orders", ["read"])]),
                    ..GroupUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.as_auth(),
            Some(&AuthError::UnknownEntity("orders".to_string()))
        );
    }

    #[tokio::test]
    async fn test_delete_keeps_groups_with_users() {
        let (service, store) = setup().await;
        for name in ["used", "unused"] {
            service.create_group(Group::new(name, vec![])).await.unwrap();
        }
        store
            .insert_user(UserFixture::customer(1).groups(&["used"]).build())
            .await;

        let err = service
            .delete_groups(&["used".to_string(), "unused".to_string()])
            .await
            .unwrap_err();
        assert_eq!(
            err.as_auth(),
            Some(&AuthError::GroupsHaveUser {
                groups: vec!["used".to_string()]
            })
        );
        assert!(store.find_group("used").await.unwrap().is_some());
        assert!(store.find_group("unused").await.unwrap().is_none());
    }
}
