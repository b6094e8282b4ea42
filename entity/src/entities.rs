//! # 业务实体目录
//!
//! 每个业务实体（`code_name`）允许出现在权限中的规则词表

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 业务实体目录项
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code_name: String,
    pub description: Option<String>,
    /// 合法规则名称数组
    pub rules: Json,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
