//! JWT and refresh-token signing
//!
//! Access tokens are HMAC-signed JWTs carrying `{user_id, role, limited, iat, exp}`.
//! Refresh tokens are opaque `base64url(raw).base64url(hmac(raw))` strings where
//! `raw = "{user_id}*{nonce}"`; only the server can read them back.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::Sha256;
use std::time::Duration;

use crate::auth::permissions::Role;
use crate::auth::types::AccessTokenPayload;
use crate::config::JwtConfig;
use crate::error::{AppError, AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of the random nonce embedded in refresh tokens
pub const REFRESH_NONCE_LENGTH: usize = 16;

/// Parse the configured signing algorithm
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name.to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(AppError::config(format!(
            "Unsupported JWT algorithm: {other}"
        ))),
    }
}

/// JWT token manager
pub struct JwtManager {
    /// Encoding key
    encoding_key: EncodingKey,
    /// Decoding key
    decoding_key: DecodingKey,
    /// Raw secret, also keys the refresh-token HMAC
    secret: Vec<u8>,
    algorithm: Algorithm,
    /// Validation configuration
    validation: Validation,
}

impl JwtManager {
    /// Create new JWT manager
    pub fn new(config: &JwtConfig) -> Result<Self> {
        if config.secret_key.is_empty() {
            return Err(AppError::config("jwt.secret_key must not be empty"));
        }

        let algorithm = parse_algorithm(&config.algorithm)?;
        let secret = config.secret_key.as_bytes().to_vec();

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
            secret,
            algorithm,
            validation,
        })
    }

    /// Sign an access token valid for `ttl`
    pub fn create_signed_token(
        &self,
        user_id: i32,
        role: Role,
        limited: bool,
        ttl: Duration,
    ) -> Result<String> {
        let iat = Utc::now().timestamp();
        let lifetime = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let payload = AccessTokenPayload {
            user_id,
            role,
            limited,
            iat,
            exp: iat.saturating_add(lifetime),
        };
        self.encode_payload(&payload)
    }

    /// Sign an explicit payload
    pub fn encode_payload(&self, payload: &AccessTokenPayload) -> Result<String> {
        encode(&Header::new(self.algorithm), payload, &self.encoding_key)
            .map_err(|e| AppError::internal_with_source("Token generation failed", e))
    }

    /// Validate signature and expiry of an access token
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenPayload> {
        decode::<AccessTokenPayload>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired.into(),
                _ => AuthError::InvalidTokenProvided.into(),
            })
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::internal(format!("Invalid HMAC key: {e}")))
    }

    /// Mint an opaque refresh token for `user_id`
    pub fn sign_refresh_token(&self, user_id: i32) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REFRESH_NONCE_LENGTH)
            .map(char::from)
            .collect();
        let raw = format!("{user_id}*{nonce}");

        let mut mac = self.mac()?;
        mac.update(raw.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(raw.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check a refresh token's signature and return the embedded user id
    pub fn verify_refresh_token(&self, token: &str) -> Result<i32> {
        let invalid = || AppError::from(AuthError::InvalidTokenProvided);

        let (raw_part, signature_part) = token.split_once('.').ok_or_else(invalid)?;
        let raw = URL_SAFE_NO_PAD.decode(raw_part).map_err(|_| invalid())?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(&raw);
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let raw = String::from_utf8(raw).map_err(|_| invalid())?;
        let (user_id, nonce) = raw.split_once('*').ok_or_else(invalid)?;
        if nonce.is_empty() {
            return Err(invalid());
        }
        user_id.parse().map_err(|_| invalid())
    }
}
