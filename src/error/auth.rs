//! Domain errors raised by the token, OTP, permission and login flows.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification surfaced to the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    /// Credential could not be accepted.
    Authentication,
    /// Credential is fine but the scope is not granted.
    Authorization,
    /// Account state forbids the operation.
    UserState,
    /// One-time code lifecycle failures.
    Otp,
    /// Rejected input.
    Validation,
}

/// The error type for every authentication and authorization operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid token provided")]
    InvalidTokenProvided,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Limited token can only be used to change the password")]
    LimitedToken,

    #[error("Permission denied")]
    PermissionDenied { entity: String, rule: String },

    #[error("Access denied")]
    AccessDenied,

    #[error("User not found")]
    UserNotFound,

    #[error("User is disabled")]
    UserIsDisabled,

    #[error("User is blocked")]
    UserIsBlocked,

    #[error("User is pending approval")]
    UserIsPending,

    #[error("User is rejected")]
    UserIsRejected,

    #[error("User must login again")]
    UserForceLogin,

    #[error("Email is not verified")]
    EmailNotVerified { username: String },

    #[error("Phone number is not verified")]
    PhoneNotVerified { username: String },

    #[error("Old password does not match")]
    OldPasswordNotMatch,

    #[error("Old password is required")]
    OldPasswordRequired,

    #[error("An OTP has already been sent, please wait before requesting another one")]
    OtpExists,

    #[error("OTP expired or invalid")]
    OtpExpiredOrInvalid,

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Invalid rules for entity {entity}")]
    InvalidRules { entity: String, rules: Vec<String> },

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Group already exists: {0}")]
    GroupExists(String),

    #[error("Some groups still have users")]
    GroupsHaveUser { groups: Vec<String> },

    #[error("Social login failed")]
    SocialLoginNotAcceptable,
}

impl AuthError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> AuthErrorKind {
        match self {
            Self::InvalidTokenProvided
            | Self::TokenExpired
            | Self::RefreshTokenExpired
            | Self::LimitedToken
            | Self::SocialLoginNotAcceptable => AuthErrorKind::Authentication,
            Self::PermissionDenied { .. } | Self::AccessDenied => AuthErrorKind::Authorization,
            Self::UserNotFound
            | Self::UserIsDisabled
            | Self::UserIsBlocked
            | Self::UserIsPending
            | Self::UserIsRejected
            | Self::UserForceLogin
            | Self::EmailNotVerified { .. }
            | Self::PhoneNotVerified { .. } => AuthErrorKind::UserState,
            Self::OtpExists | Self::OtpExpiredOrInvalid => AuthErrorKind::Otp,
            Self::OldPasswordNotMatch
            | Self::OldPasswordRequired
            | Self::InvalidUsername(_)
            | Self::UnknownEntity(_)
            | Self::InvalidRules { .. }
            | Self::GroupNotFound(_)
            | Self::GroupExists(_)
            | Self::GroupsHaveUser { .. } => AuthErrorKind::Validation,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTokenProvided => "invalid_token",
            Self::TokenExpired => "access_token_expired",
            Self::RefreshTokenExpired => "refresh_token_expired",
            Self::LimitedToken => "limited_token",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::AccessDenied => "access_denied",
            Self::UserNotFound => "user_not_found",
            Self::UserIsDisabled => "user_is_disabled",
            Self::UserIsBlocked => "user_is_blocked",
            Self::UserIsPending => "user_is_pending",
            Self::UserIsRejected => "user_is_rejected",
            Self::UserForceLogin => "is_force_login",
            Self::EmailNotVerified { .. } => "email_not_verified",
            Self::PhoneNotVerified { .. } => "phone_not_verified",
            Self::OldPasswordNotMatch => "old_password_not_match",
            Self::OldPasswordRequired => "old_password_required",
            Self::OtpExists => "otp_exists",
            Self::OtpExpiredOrInvalid => "otp_expired",
            Self::InvalidUsername(_) => "invalid_username",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::InvalidRules { .. } => "invalid_rules",
            Self::GroupNotFound(_) => "group_not_found",
            Self::GroupExists(_) => "group_exists",
            Self::GroupsHaveUser { .. } => "groups_have_user",
            Self::SocialLoginNotAcceptable => "social_login_failed",
        }
    }

    /// Extra context for the caller, e.g. the offending rule names.
    #[must_use]
    pub fn detail(&self) -> Vec<String> {
        match self {
            Self::PermissionDenied { entity, rule } => vec![format!("{entity}:{rule}")],
            Self::EmailNotVerified { username } | Self::PhoneNotVerified { username } => {
                vec![username.clone()]
            }
            Self::InvalidUsername(value)
            | Self::UnknownEntity(value)
            | Self::GroupNotFound(value)
            | Self::GroupExists(value) => vec![value.clone()],
            Self::InvalidRules { rules, .. } => rules.clone(),
            Self::GroupsHaveUser { groups } => groups.clone(),
            _ => Vec::new(),
        }
    }

    /// Transport status used at the HTTP boundary.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UserNotFound | Self::OtpExpiredOrInvalid | Self::GroupNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::GroupExists(_) => StatusCode::CONFLICT,
            Self::OtpExists | Self::SocialLoginNotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Self::GroupsHaveUser { .. } => StatusCode::BAD_REQUEST,
            _ => match self.kind() {
                AuthErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                AuthErrorKind::Authorization | AuthErrorKind::UserState => StatusCode::FORBIDDEN,
                AuthErrorKind::Otp => StatusCode::BAD_REQUEST,
                AuthErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }
}
