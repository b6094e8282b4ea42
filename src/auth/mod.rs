//! # 认证授权模块
//!
//! 令牌生命周期、一次性验证码、基于角色与分组的权限解析，以及登录流程编排

pub mod groups;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod permissions;
pub mod service;
pub mod social;
pub mod token;
pub mod types;

pub use groups::{DeleteGroupsOutcome, GroupService};
pub use jwt::JwtManager;
pub use otp::OtpService;
pub use permissions::{PermissionMap, PermissionResolver, Role, Scope};
pub use service::{AuthDependencies, AuthService};
pub use social::{FacebookProvider, GoogleProvider, IdentityProvider};
pub use token::TokenService;
pub use types::{
    AccessTokenPayload, EntityRules, Group, GroupUpdate, LoginType, NewUser, OtpRequestType,
    Permission, SocialProfile, TokenPair, User, UserChanges, UserStatus, Username,
};
