//! Identity Toolkit REST Client
//!
//! Thin client for an Identity Toolkit compatible REST API:
//! - `accounts:signInWithPassword` - email/password verification
//! - `accounts:sendOobCode` - password reset link delivery
//! - `accounts:update` - secret change for a signed-in principal
//! - `securetoken` `token` - refresh token exchange (session restore)
//!
//! Provider error messages are returned as raw codes (`EMAIL_NOT_FOUND`,
//! `USER_DISABLED`, ...). Mapping them to domain errors is the caller's job.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Default Identity Toolkit endpoint
pub const DEFAULT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Default secure token endpoint
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1";

// ============================================================================
// Error Types
// ============================================================================

/// Identity toolkit client errors
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// The API rejected the request with a provider error code
    #[error("Identity toolkit error {status}: {code}")]
    Api { status: u16, code: String },

    /// Transport failure
    #[error("Identity toolkit request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected response body
    #[error("Identity toolkit response could not be decoded: {0}")]
    Decode(String),
}

impl ToolkitError {
    /// Provider error code, if the API returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            ToolkitError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

/// Extract the bare error code from a provider message.
///
/// Messages look like `TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account...`.
pub fn parse_error_code(message: &str) -> &str {
    message
        .split_once(" : ")
        .map_or(message, |(code, _)| code)
        .trim()
}

// ============================================================================
// Configuration
// ============================================================================

/// Client configuration
#[derive(Clone)]
pub struct ToolkitConfig {
    /// Project web API key
    pub api_key: String,
    /// Accounts endpoint base URL (overridable for emulators)
    pub endpoint: String,
    /// Secure token endpoint base URL
    pub token_endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ToolkitConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point both endpoints at a local emulator host (e.g. `http://127.0.0.1:9099`)
    pub fn with_emulator(mut self, host: &str) -> Self {
        let host = host.trim_end_matches('/');
        self.endpoint = format!("{host}/identitytoolkit.googleapis.com/v1");
        self.token_endpoint = format!("{host}/securetoken.googleapis.com/v1");
        self
    }
}

impl fmt::Debug for ToolkitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolkitConfig")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Token grant
// ============================================================================

/// Tokens issued for an authenticated principal
#[derive(Clone)]
pub struct TokenGrant {
    /// Provider principal id
    pub local_id: String,
    /// Principal email, when the provider reports it
    pub email: Option<String>,
    /// Short-lived id token
    pub id_token: Zeroizing<String>,
    /// Long-lived refresh token
    pub refresh_token: Zeroizing<String>,
    /// Id token lifetime
    pub expires_in: Duration,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("local_id", &self.local_id)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordSignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordRequest<'a> {
    id_token: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountTokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn parse_expires_in(raw: &str) -> Result<Duration, ToolkitError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ToolkitError::Decode(format!("invalid expiresIn: {raw}")))
}

impl AccountTokenResponse {
    fn into_grant(self) -> Result<TokenGrant, ToolkitError> {
        Ok(TokenGrant {
            expires_in: parse_expires_in(&self.expires_in)?,
            local_id: self.local_id,
            email: self.email,
            id_token: Zeroizing::new(self.id_token),
            refresh_token: Zeroizing::new(self.refresh_token),
        })
    }
}

impl RefreshResponse {
    fn into_grant(self) -> Result<TokenGrant, ToolkitError> {
        Ok(TokenGrant {
            expires_in: parse_expires_in(&self.expires_in)?,
            local_id: self.user_id,
            email: None,
            id_token: Zeroizing::new(self.id_token),
            refresh_token: Zeroizing::new(self.refresh_token),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Identity toolkit REST client
#[derive(Debug, Clone)]
pub struct IdentityToolkitClient {
    http: reqwest::Client,
    config: ToolkitConfig,
}

impl IdentityToolkitClient {
    pub fn new(config: ToolkitConfig) -> Result<Self, ToolkitError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Verify an email/password pair
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenGrant, ToolkitError> {
        let body = PasswordSignInRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: AccountTokenResponse = self
            .post(&self.accounts_url("signInWithPassword"), &body)
            .await?;
        response.into_grant()
    }

    /// Ask the provider to email a password reset link
    pub async fn send_password_reset(&self, email: &str) -> Result<(), ToolkitError> {
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = self.post(&self.accounts_url("sendOobCode"), &body).await?;
        Ok(())
    }

    /// Change the password of the principal owning `id_token`
    ///
    /// The provider revokes the previous tokens and issues a new grant.
    pub async fn update_password(
        &self,
        id_token: &str,
        new_password: &str,
    ) -> Result<TokenGrant, ToolkitError> {
        let body = UpdatePasswordRequest {
            id_token,
            password: new_password,
            return_secure_token: true,
        };
        let response: AccountTokenResponse =
            self.post(&self.accounts_url("update"), &body).await?;
        response.into_grant()
    }

    /// Exchange a refresh token for a fresh grant
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ToolkitError> {
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        let url = format!(
            "{}/token?key={}",
            self.config.token_endpoint, self.config.api_key
        );
        let response: RefreshResponse = self.post(&url, &body).await?;
        response.into_grant()
    }

    fn accounts_url(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.config.endpoint, method, self.config.api_key
        )
    }

    async fn post<B, T>(&self, url: &str, body: &B) -> Result<T, ToolkitError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let code = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .map(|envelope| parse_error_code(&envelope.error.message).to_string())
                .unwrap_or_else(|_| "UNKNOWN".to_string());
            tracing::debug!(status = status.as_u16(), code = %code, "Identity toolkit rejected request");
            return Err(ToolkitError::Api {
                status: status.as_u16(),
                code,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ToolkitError::Decode(e.to_string()))
    }
}
