//! # 存储接口
//!
//! 认证核心依赖的用户、分组、实体目录存储

pub mod database;
pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::auth::permissions::Role;
use crate::auth::types::{EntityRules, Group, GroupUpdate, NewUser, User, UserChanges, Username};
use crate::error::Result;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

/// 用户存储
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按 ID 查找
    async fn find_by_id(&self, id: i32) -> Result<Option<User>>;

    /// 按用户名查找，可限定角色
    async fn find_by_username(
        &self,
        username: &Username,
        allowed_roles: Option<&[Role]>,
    ) -> Result<Option<User>>;

    /// 按邮箱查找
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// 创建用户
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// 部分更新用户，用户不存在时返回 `UserNotFound`
    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<User>;

    /// 统计每个分组下的用户数（没有用户的分组不出现在结果中）
    async fn count_users_in_groups(&self, names: &[String]) -> Result<HashMap<String, u64>>;
}

/// 分组存储
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// 批量按名称查找，不存在的名称被忽略
    async fn find_groups(&self, names: &[String]) -> Result<Vec<Group>>;

    /// 按名称查找
    async fn find_group(&self, name: &str) -> Result<Option<Group>>;

    /// 创建分组，同名时返回 `GroupExists`
    async fn create_group(&self, group: Group) -> Result<Group>;

    /// 更新分组，不存在时返回 `GroupNotFound`
    async fn update_group(&self, name: &str, update: GroupUpdate) -> Result<Group>;

    /// 删除分组，返回实际删除的数量
    async fn delete_groups(&self, names: &[String]) -> Result<u64>;
}

/// 实体目录存储
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 查找实体的规则词表
    async fn find_entity(&self, code_name: &str) -> Result<Option<EntityRules>>;

    /// 列出全部实体
    async fn list_entities(&self) -> Result<Vec<EntityRules>>;

    /// 新增或替换实体词表
    async fn upsert_entity(&self, entity: EntityRules) -> Result<()>;
}

/// 角色过滤
fn role_allowed(role: Role, allowed_roles: Option<&[Role]>) -> bool {
    allowed_roles.is_none_or(|roles| roles.contains(&role))
}
