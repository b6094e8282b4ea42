//! # 用户实体定义
//!
//! 用户账户表的 Sea-ORM 实体模型，权限与分组以 JSON 列保存

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: Option<String>,
    #[sea_orm(unique)]
    pub mobile_number: Option<String>,
    pub hashed_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    /// `admin` / `customer` / `audit`
    pub role: String,
    /// 所属分组名称数组
    pub groups: Json,
    /// 直接授予的权限数组 `[{entity, rules}]`
    pub permissions: Json,
    pub is_enable: bool,
    pub is_blocked: bool,
    pub is_force_login: bool,
    pub is_force_change_password: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub user_status: String,
    pub login_type: String,
    pub login_datetime: Option<DateTime>,
    pub last_login_datetime: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
