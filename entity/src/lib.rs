//! # Entity 模块
//!
//! 包含认证核心使用的 Sea-ORM 实体定义

pub mod entities;
pub mod groups;
pub mod users;

pub use entities::Entity as Entities;
pub use groups::Entity as Groups;
pub use users::Entity as Users;
