//! # 第三方身份提供方
//!
//! 把授权码或令牌换成经过提供方验证的用户资料

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use std::time::Duration;
use url::Url;

use crate::auth::types::SocialProfile;
use crate::config::{FacebookConfig, GoogleConfig};
use crate::error::{AppError, Result};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 身份提供方接口
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 提供方名称
    fn name(&self) -> &'static str;

    /// 用授权码换取资料
    async fn exchange_code(&self, code: &str) -> Result<SocialProfile>;

    /// 用访问令牌 / ID 令牌换取资料
    async fn profile_from_token(&self, token: &str) -> Result<SocialProfile>;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("commerce-auth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::config_with_source("创建 HTTP 客户端失败", e))
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| AppError::config_with_source(format!("无效的地址: {raw}"), e))
}

/// 发送请求并解析 JSON，非 2xx 视为网络错误
async fn fetch_json<T: DeserializeOwned>(provider: &str, request: reqwest::RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::network(format!(
            "{provider} 返回错误状态 {status}"
        )));
    }
    Ok(response.json::<T>().await?)
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
}

/// tokeninfo 接口把布尔值编码为字符串
fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flexible>::deserialize(deserializer)? {
        Some(Flexible::Bool(value)) => value,
        Some(Flexible::Text(value)) => value.eq_ignore_ascii_case("true"),
        None => false,
    })
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    email_verified: bool,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    aud: Option<String>,
}

impl From<GoogleProfile> for SocialProfile {
    fn from(profile: GoogleProfile) -> Self {
        Self {
            email: normalize_email(profile.email),
            first_name: profile.given_name,
            last_name: profile.family_name,
            avatar: profile.picture,
            email_verified: profile.email_verified,
        }
    }
}

/// Google 登录
pub struct GoogleProvider {
    config: GoogleConfig,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// 创建 Google 提供方
    pub fn new(config: GoogleConfig) -> Result<Self> {
        Ok(Self {
            config,
            http_client: http_client()?,
        })
    }

    async fn userinfo(&self, access_token: &str) -> Result<SocialProfile> {
        let profile: GoogleProfile = fetch_json(
            self.name(),
            self.http_client
                .get(parse_url(&self.config.userinfo_url)?)
                .bearer_auth(access_token),
        )
        .await?;
        Ok(profile.into())
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn exchange_code(&self, code: &str) -> Result<SocialProfile> {
        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let token: AccessTokenResponse = fetch_json(
            self.name(),
            self.http_client
                .post(parse_url(&self.config.token_url)?)
                .form(&form),
        )
        .await?;

        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Social,
            "google_code_exchanged",
            "Google 授权码交换成功"
        );
        self.userinfo(&token.access_token).await
    }

    async fn profile_from_token(&self, token: &str) -> Result<SocialProfile> {
        let mut url = parse_url(&self.config.tokeninfo_url)?;
        url.query_pairs_mut().append_pair("id_token", token);

        let profile: GoogleProfile = fetch_json(self.name(), self.http_client.get(url)).await?;
        if !self.config.client_id.is_empty()
            && profile.aud.as_deref() != Some(self.config.client_id.as_str())
        {
            return Err(AppError::network("Google ID 令牌的受众不匹配"));
        }
        Ok(profile.into())
    }
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: Option<FacebookPictureData>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    picture: Option<FacebookPicture>,
}

impl From<FacebookProfile> for SocialProfile {
    fn from(profile: FacebookProfile) -> Self {
        let email = normalize_email(profile.email);
        Self {
            email_verified: email.is_some(),
            email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            avatar: profile
                .picture
                .and_then(|picture| picture.data)
                .and_then(|data| data.url),
        }
    }
}

/// Facebook 登录
pub struct FacebookProvider {
    config: FacebookConfig,
    http_client: reqwest::Client,
}

impl FacebookProvider {
    /// 创建 Facebook 提供方
    pub fn new(config: FacebookConfig) -> Result<Self> {
        Ok(Self {
            config,
            http_client: http_client()?,
        })
    }

    fn graph_url(&self, path: &str) -> Result<Url> {
        parse_url(&format!(
            "{}/{path}",
            self.config.graph_url.trim_end_matches('/')
        ))
    }
}

#[async_trait]
impl IdentityProvider for FacebookProvider {
    fn name(&self) -> &'static str {
        "facebook"
    }

    async fn exchange_code(&self, code: &str) -> Result<SocialProfile> {
        let mut url = self.graph_url("oauth/access_token")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", &self.config.client_secret)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("code", code);

        let token: AccessTokenResponse = fetch_json(self.name(), self.http_client.get(url)).await?;
        self.profile_from_token(&token.access_token).await
    }

    async fn profile_from_token(&self, token: &str) -> Result<SocialProfile> {
        let mut url = self.graph_url("me")?;
        url.query_pairs_mut()
            .append_pair("fields", "id,email,first_name,last_name,picture")
            .append_pair("access_token", token);

        let profile: FacebookProfile = fetch_json(self.name(), self.http_client.get(url)).await?;
        Ok(profile.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn google_config(server: &MockServer) -> GoogleConfig {
        GoogleConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://shop.example.com/callback".to_string(),
            token_url: format!("{}/token", server.uri()),
            userinfo_url: format!("{}/userinfo", server.uri()),
            tokeninfo_url: format!("{}/tokeninfo", server.uri()),
        }
    }

    #[tokio::test]
    async fn test_google_code_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "g-token"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer g-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": "Buyer@Example.com",
                "email_verified": true,
                "given_name": "Sara",
                "family_name": "Karimi",
                "picture": "https://img.example.com/a.png"
            })))
            .mount(&server)
            .await;

        let provider = GoogleProvider::new(google_config(&server)).unwrap();
        let profile = provider.exchange_code("auth-code").await.unwrap();

        assert_eq!(
            profile,
            SocialProfile {
                email: Some("buyer@example.com".to_string()),
                first_name: Some("Sara".to_string()),
                last_name: Some("Karimi".to_string()),
                avatar: Some("https://img.example.com/a.png".to_string()),
                email_verified: true,
            }
        );
    }

    #[tokio::test]
    async fn test_google_id_token_checks_audience() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("id_token", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": "a@example.com",
                "email_verified": "true",
                "aud": "client-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("id_token", "foreign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": "a@example.com",
                "aud": "someone-else"
            })))
            .mount(&server)
            .await;

        let provider = GoogleProvider::new(google_config(&server)).unwrap();
        let profile = provider.profile_from_token("good").await.unwrap();
        assert!(profile.email_verified);
        assert!(provider.profile_from_token("foreign").await.is_err());
    }

    #[tokio::test]
    async fn test_facebook_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(query_param("access_token", "fb-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "1001",
                "first_name": "Reza",
                "picture": {"data": {"url": "https://img.example.com/r.png"}}
            })))
            .mount(&server)
            .await;

        let provider = FacebookProvider::new(FacebookConfig {
            graph_url: server.uri(),
            ..FacebookConfig::default()
        })
        .unwrap();
        let profile = provider.profile_from_token("fb-token").await.unwrap();

        assert_eq!(profile.email, None);
        assert!(!profile.email_verified);
        assert_eq!(profile.avatar.as_deref(), Some("https://img.example.com/r.png"));
    }

    #[tokio::test]
    async fn test_provider_error_status_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let provider = FacebookProvider::new(FacebookConfig {
            graph_url: server.uri(),
            ..FacebookConfig::default()
        })
        .unwrap();
        let err = provider.exchange_code("bad").await.unwrap_err();
        assert!(matches!(err, AppError::Network { .. }));
    }
}
