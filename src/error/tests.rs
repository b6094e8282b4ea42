//! # 错误处理测试

use crate::error::{AppError, AuthError, AuthErrorKind, Context, ErrorCategory};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::error::Error;

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = AppError::config_with_source("配置文件加载失败", io_err);

    assert!(matches!(err, AppError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 配置文件加载失败");
    assert!(err.source().is_some());
}

#[rstest]
#[case(AuthError::InvalidTokenProvided, AuthErrorKind::Authentication, StatusCode::UNAUTHORIZED)]
#[case(AuthError::TokenExpired, AuthErrorKind::Authentication, StatusCode::UNAUTHORIZED)]
#[case(AuthError::RefreshTokenExpired, AuthErrorKind::Authentication, StatusCode::UNAUTHORIZED)]
#[case(AuthError::LimitedToken, AuthErrorKind::Authentication, StatusCode::UNAUTHORIZED)]
#[case(AuthError::AccessDenied, AuthErrorKind::Authorization, StatusCode::FORBIDDEN)]
#[case(AuthError::UserForceLogin, AuthErrorKind::UserState, StatusCode::FORBIDDEN)]
#[case(AuthError::UserNotFound, AuthErrorKind::UserState, StatusCode::NOT_FOUND)]
#[case(AuthError::OtpExists, AuthErrorKind::Otp, StatusCode::NOT_ACCEPTABLE)]
#[case(AuthError::OtpExpiredOrInvalid, AuthErrorKind::Otp, StatusCode::NOT_FOUND)]
#[case(AuthError::OldPasswordNotMatch, AuthErrorKind::Validation, StatusCode::UNPROCESSABLE_ENTITY)]
#[case(AuthError::GroupNotFound("staff".into()), AuthErrorKind::Validation, StatusCode::NOT_FOUND)]
#[case(AuthError::GroupExists("staff".into()), AuthErrorKind::Validation, StatusCode::CONFLICT)]
fn test_auth_error_classification(
    #[case] err: AuthError,
    #[case] kind: AuthErrorKind,
    #[case] status: StatusCode,
) {
    assert_eq!(err.kind(), kind);
    assert_eq!(err.status_code(), status);
    assert_eq!(AppError::from(err).status_code(), status);
}

#[test]
fn test_invalid_rules_detail_names_offending_rules() {
    let err = AuthError::InvalidRules {
        entity: "files".to_string(),
        rules: vec!["fly".to_string(), "teleport".to_string()],
    };
    assert_eq!(err.code(), "invalid_rules");
    assert_eq!(err.detail(), vec!["fly".to_string(), "teleport".to_string()]);
}

#[test]
fn test_permission_denied_detail() {
    let err = AuthError::PermissionDenied {
        entity: "files".to_string(),
        rule: "delete".to_string(),
    };
    assert_eq!(err.to_string(), "Permission denied");
    assert_eq!(err.detail(), vec!["files:delete".to_string()]);
}

#[test]
fn test_context_keeps_inner_status() {
    let result: Result<(), AppError> = Err(AuthError::UserNotFound.into());
    let err = result.context("加载用户失败").unwrap_err();

    assert!(err.to_string().starts_with("加载用户失败"));
    assert_eq!(err.as_auth(), Some(&AuthError::UserNotFound));
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn test_error_category() {
    assert_eq!(AppError::cache("down").category(), ErrorCategory::Server);
    assert_eq!(
        AppError::from(AuthError::PermissionDenied {
            entity: "files".to_string(),
            rule: "read".to_string(),
        })
        .category(),
        ErrorCategory::Client
    );
}

#[test]
fn test_auto_conversion_from_json_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: AppError = json_err.into();
    assert!(matches!(err, AppError::Serialization { .. }));
}

#[test]
fn test_into_response_status() {
    let response = AppError::from(AuthError::OtpExists).into_response();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    let response = AppError::internal("boom").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
