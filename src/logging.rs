//! # 日志配置模块
//!
//! 基于 `tracing` 的结构化日志初始化，以及带阶段/组件字段的日志宏

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 进程启动
    Startup,
    /// 进程关闭
    Shutdown,
    /// 身份认证
    Authentication,
    /// 权限判定
    Authorization,
    /// 令牌签发与轮换
    Token,
    /// 一次性验证码
    Otp,
    /// 缓存操作
    Cache,
    /// 数据库操作
    Database,
    /// 外部通知投递
    Notification,
    /// 配置加载
    Configuration,
}

impl LogStage {
    /// 字段值
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Token => "token",
            Self::Otp => "otp",
            Self::Cache => "cache",
            Self::Database => "database",
            Self::Notification => "notification",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 认证流程编排
    Auth,
    /// 令牌服务
    Token,
    /// 验证码服务
    Otp,
    /// 权限解析
    Permission,
    /// 分组管理
    Group,
    /// 缓存
    Cache,
    /// 数据库
    Database,
    /// 通知投递
    Notifier,
    /// 第三方登录
    Social,
    /// 配置
    Config,
}

impl LogComponent {
    /// 字段值
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Auth => "auth",
            Self::Token => "token",
            Self::Otp => "otp",
            Self::Permission => "permission",
            Self::Group => "group",
            Self::Cache => "cache",
            Self::Database => "database",
            Self::Notifier => "notifier",
            Self::Social => "social",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 信息级结构化日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 调试级结构化日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 警告级结构化日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 错误级结构化日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 构建默认过滤规则，依赖库统一压到 warn
fn default_filter(level: &str) -> String {
    format!(
        "{level},commerce_auth={level},sqlx=warn,sea_orm=warn,hyper=warn,reqwest=warn,redis=warn"
    )
}

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先使用，否则使用传入级别（默认 info）。
/// 重复初始化时静默忽略，方便测试中多次调用。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = env::var("RUST_LOG").map_or_else(
        |_| EnvFilter::new(default_filter(level)),
        EnvFilter::new,
    );

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_caps_dependencies() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("debug,commerce_auth=debug"));
        assert!(filter.contains("sqlx=warn"));
        assert!(filter.contains("redis=warn"));
    }

    #[test]
    fn test_stage_and_component_display() {
        assert_eq!(LogStage::Otp.to_string(), "otp");
        assert_eq!(LogComponent::Permission.to_string(), "permission");
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(Some("warn"));
        init_logging(None);
        linfo!("test", LogStage::Startup, LogComponent::Main, "init_twice", "ok");
    }
}
