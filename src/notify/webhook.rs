//! # HTTP 回调投递
//!
//! 把短信 / 邮件投递请求以 JSON POST 转发给外部网关

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;
use crate::config::NotifierConfig;
use crate::error::{AppError, Result};
use crate::{ldebug, logging::{LogComponent, LogStage}};

#[derive(Serialize)]
struct SmsRequest<'a> {
    to: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// HTTP 回调投递实现
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    sms_url: Option<String>,
    email_url: Option<String>,
    sender_email: String,
}

impl WebhookNotifier {
    /// 创建投递客户端
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("commerce-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config_with_source("创建 HTTP 客户端失败", e))?;

        Ok(Self {
            http_client,
            sms_url: config.sms_url.clone(),
            email_url: config.email_url.clone(),
            sender_email: config.sender_email.clone(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, url: Option<&str>, channel: &str, body: &T) -> Result<()> {
        let url = url.ok_or_else(|| AppError::config(format!("未配置{channel}投递地址")))?;

        let response = self.http_client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(format!(
                "{channel}投递失败，网关返回 {status}"
            )));
        }

        ldebug!(
            "system",
            LogStage::Notification,
            LogComponent::Notifier,
            "webhook_delivered",
            &format!("{channel}投递成功")
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_sms(&self, phone: &str, message: &str) -> Result<()> {
        self.post(
            self.sms_url.as_deref(),
            "短信",
            &SmsRequest { to: phone, message },
        )
        .await
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.post(
            self.email_url.as_deref(),
            "邮件",
            &EmailRequest {
                from: &self.sender_email,
                to,
                subject,
                body,
            },
        )
        .await
    }
}
