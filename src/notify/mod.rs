//! # 通知投递
//!
//! 短信 / 邮件投递接口，以及验证码消息的渲染

pub mod webhook;

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::types::OtpRequestType;
use crate::config::{NotifierConfig, NotifierKind, OtpConfig};
use crate::error::Result;
use crate::{linfo, logging::{LogComponent, LogStage}};

pub use webhook::WebhookNotifier;

/// 通知投递接口
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送短信
    async fn send_sms(&self, phone: &str, message: &str) -> Result<()>;

    /// 发送邮件
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// 只写日志的投递实现，开发与测试模式使用
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_sms(&self, phone: &str, message: &str) -> Result<()> {
        linfo!(
            "system",
            LogStage::Notification,
            LogComponent::Notifier,
            "sms_logged",
            &format!("短信投递 -> {phone} ({} 字节)", message.len())
        );
        Ok(())
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        linfo!(
            "system",
            LogStage::Notification,
            LogComponent::Notifier,
            "email_logged",
            &format!("邮件投递 -> {to}: {subject} ({} 字节)", body.len())
        );
        Ok(())
    }
}

/// 根据配置构建投递实现
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Webhook => Ok(Arc::new(WebhookNotifier::new(config)?)),
    }
}

/// 渲染后的验证码消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpMessage {
    /// 短信正文
    Sms { body: String },
    /// 邮件标题与正文
    Email { subject: String, body: String },
}

/// 渲染短信验证码
#[must_use]
pub fn render_sms(config: &OtpConfig, code: &str) -> OtpMessage {
    OtpMessage::Sms {
        body: config.sms_template.replace("{code}", code),
    }
}

/// 渲染邮件验证码，标题由用途决定
#[must_use]
pub fn render_email(
    config: &OtpConfig,
    code: &str,
    request_type: OtpRequestType,
    first_name: Option<&str>,
) -> OtpMessage {
    let subject = match request_type {
        OtpRequestType::Verification => config.email_subject_verification.clone(),
        OtpRequestType::ResetPassword => config.email_subject_reset_password.clone(),
    };
    let greeting = first_name.map_or_else(|| "Hello,".to_string(), |name| format!("Hello {name},"));
    let body = format!("{greeting}\n\nYour code is {code}.\n");
    OtpMessage::Email { subject, body }
}
