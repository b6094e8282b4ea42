//! # 角色与权限解析
//!
//! 定义用户角色，并把用户直接权限与所属分组权限合并为有效权限表

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::auth::types::{Permission, User};
use crate::error::{AuthError, Result};
use crate::store::{EntityStore, GroupStore};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 用户角色枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 管理员
    Admin,
    /// 客户
    Customer,
    /// 审计员（只读后台）
    Audit,
}

impl Role {
    /// 获取角色的字符串表示
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
            Self::Audit => "audit",
        }
    }

    /// 从字符串解析角色
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "customer" => Some(Self::Customer),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }

    /// 是否可以进入管理后台
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Audit)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid user role: {s}"))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 权限要求：实体 + 规则
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub entity: String,
    pub rule: String,
}

impl Scope {
    /// 构造权限要求
    pub fn new(entity: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            rule: rule.into(),
        }
    }
}

/// 有效权限表：实体 → 规则集合
pub type PermissionMap = BTreeMap<String, BTreeSet<String>>;

/// 把一组权限按实体并入权限表
pub fn merge_permissions<'a>(
    map: &mut PermissionMap,
    permissions: impl IntoIterator<Item = &'a Permission>,
) {
    for permission in permissions {
        map.entry(permission.entity.clone())
            .or_default()
            .extend(permission.rules.iter().cloned());
    }
}

/// 权限解析器
pub struct PermissionResolver {
    groups: Arc<dyn GroupStore>,
    entities: Arc<dyn EntityStore>,
}

impl PermissionResolver {
    /// 创建权限解析器
    pub fn new(groups: Arc<dyn GroupStore>, entities: Arc<dyn EntityStore>) -> Self {
        Self { groups, entities }
    }

    /// 计算用户的有效权限（直接权限与各启用分组权限的并集）
    pub async fn effective_permissions(&self, user: &User) -> Result<PermissionMap> {
        let mut map = PermissionMap::new();
        merge_permissions(&mut map, &user.permissions);

        if user.groups.is_empty() {
            return Ok(map);
        }

        let groups = self.groups.find_groups(&user.groups).await?;
        for name in &user.groups {
            if !groups.iter().any(|group| &group.name == name) {
                ldebug!(
                    "system",
                    LogStage::Authorization,
                    LogComponent::Permission,
                    "group_missing",
                    &format!("用户 {} 引用的分组不存在: {name}", user.id)
                );
            }
        }

        for group in groups.iter().filter(|group| group.is_enable) {
            merge_permissions(&mut map, &group.permissions);
        }

        Ok(map)
    }

    /// 检查用户是否拥有权限要求；没有要求时直接放行
    pub async fn check_scope(&self, user: &User, scope: Option<&Scope>) -> Result<()> {
        let Some(scope) = scope else {
            return Ok(());
        };

        let map = self.effective_permissions(user).await?;
        let granted = map
            .get(&scope.entity)
            .is_some_and(|rules| rules.contains(&scope.rule));

        if granted {
            Ok(())
        } else {
            ldebug!(
                "system",
                LogStage::Authorization,
                LogComponent::Permission,
                "permission_denied",
                &format!(
                    "用户 {} 缺少权限 {}:{}",
                    user.id, scope.entity, scope.rule
                )
            );
            Err(AuthError::PermissionDenied {
                entity: scope.entity.clone(),
                rule: scope.rule.clone(),
            }
            .into())
        }
    }

    /// 校验规则是否都属于实体的合法规则词表
    pub async fn validate_rules(&self, entity: &str, rules: &BTreeSet<String>) -> Result<()> {
        let catalog = self
            .entities
            .find_entity(entity)
            .await?
            .ok_or_else(|| AuthError::UnknownEntity(entity.to_string()))?;

        let invalid: Vec<String> = rules
            .iter()
            .filter(|rule| !catalog.valid_rules.contains(*rule))
            .cloned()
            .collect();

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(AuthError::InvalidRules {
                entity: entity.to_string(),
                rules: invalid,
            }
            .into())
        }
    }

    /// 校验一组权限
    pub async fn validate_permissions(&self, permissions: &[Permission]) -> Result<()> {
        for permission in permissions {
            self.validate_rules(&permission.entity, &permission.rules)
                .await?;
        }
        Ok(())
    }
}
