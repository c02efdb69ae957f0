//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 服务账号认证：签发 RS256 JWT 并换取访问令牌。

use crate::config::CredentialsConfig;
use crate::error::{I18nError, Result};
use crate::utils::redaction::redact_value;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// 断言有效期
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// 提前刷新的余量
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

/// 服务账号认证器
///
/// 访问令牌缓存到过期前一分钟
pub struct ServiceAccountAuth {
    client_email: String,
    key: EncodingKey,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_url", &self.token_url)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ServiceAccountAuth {
    /// 私钥在构造时解析，格式错误立即返回 `I18nError::Auth`
    pub fn new(credentials: &CredentialsConfig, token_url: &str) -> Result<Self> {
        // 环境变量中的私钥常以字面量 "\n" 保存
        let pem = credentials.private_key.expose_secret().replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| I18nError::Auth(format!("Invalid service account private key: {}", e)))?;

        Ok(Self {
            client_email: credentials.client_email.clone(),
            key,
            token_url: token_url.to_string(),
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| I18nError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    /// 获取有效的访问令牌
    #[instrument(skip(self, client), level = "debug", fields(email = %self.client_email))]
    pub async fn access_token(&self, client: &Client) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion()?;
        let response = client
            .post(&self.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| I18nError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(I18nError::Auth(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| I18nError::Auth(format!("Invalid token response: {}", e)))?;
        debug!(
            "Access token obtained: {}, expires_in={}s",
            redact_value(&token.access_token, 4),
            token.expires_in
        );

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        let value = SecretString::from(token.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(value)
    }
}
