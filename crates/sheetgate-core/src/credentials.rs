//! Service-account authentication for the spreadsheet API.
//!
//! The credentials file is a service-account JSON key. It is read once when
//! the authenticator is built. Every [`Authenticator::authenticate`] call then
//! signs a fresh RS256 assertion and exchanges it at the OAuth2 token endpoint
//! for a bearer access token.
//!
//! # Token Exchange
//!
//! ```text
//! POST {token_uri}
//!   grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer
//!   assertion=<JWT{iss, scope, aud, iat, exp}>
//! → {"access_token": "...", "expires_in": 3599, "token_type": "Bearer"}
//! ```

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::AuthError;
use crate::remote::RemoteSession;
use crate::session::Authenticator;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Service-account key as downloaded from the provider console.
///
/// Only the fields needed for the token exchange are read; everything else in
/// the file is ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Account email, used as the assertion issuer
    pub client_email: String,

    /// PEM-encoded RSA private key (PKCS#8 or PKCS#1)
    pub private_key: String,

    /// Key identifier, sent as the JWT `kid` header when present
    #[serde(default)]
    pub private_key_id: Option<String>,

    /// OAuth2 token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// - `AuthError::CredentialsUnreadable` if the file cannot be read
    /// - `AuthError::InvalidCredentials` if it is not a service-account key
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AuthError::CredentialsUnreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Self::from_json(&content)
    }

    /// Parse a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let key: Self = serde_json::from_str(json).map_err(|e| AuthError::InvalidCredentials {
            message: format!("Failed to parse service account key: {}", e),
        })?;

        if key.client_email.trim().is_empty() {
            return Err(AuthError::InvalidCredentials {
                message: "client_email cannot be empty".to_string(),
            });
        }

        Ok(key)
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<REDACTED>")
            .finish()
    }
}

/// Claims of the signed assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionClaims {
    /// Issuer (service account email)
    pub iss: String,
    /// Space-separated OAuth2 scopes
    pub scope: String,
    /// Audience (token endpoint)
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Authenticates as a service account and yields a [`RemoteSession`].
pub struct ServiceAccountAuthenticator {
    client_email: String,
    private_key_id: Option<String>,
    token_uri: String,
    scopes: Vec<String>,
    api_base_url: String,
    encoding_key: EncodingKey,
    http_client: reqwest::Client,
}

impl ServiceAccountAuthenticator {
    /// Build an authenticator from a parsed key and the remote settings.
    ///
    /// The private key is parsed here so a malformed key fails at
    /// construction rather than on the first call.
    pub fn new(key: ServiceAccountKey, remote: &RemoteConfig) -> Result<Self, AuthError> {
        let encoding_key = encoding_key_from_pem(&key.private_key)?;

        let http_client = reqwest::Client::builder()
            .user_agent(remote.user_agent.clone())
            .timeout(Duration::from_secs(remote.request_timeout_seconds))
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client_email: key.client_email,
            private_key_id: key.private_key_id,
            token_uri: remote.token_uri.clone().unwrap_or(key.token_uri),
            scopes: remote.scopes.clone(),
            api_base_url: remote.api_base_url.clone(),
            encoding_key,
            http_client,
        })
    }

    /// Read the key file at `path` and build an authenticator.
    pub fn from_file(path: &Path, remote: &RemoteConfig) -> Result<Self, AuthError> {
        Self::new(ServiceAccountKey::from_file(path)?, remote)
    }

    /// Get the service account email.
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Get the token endpoint in use.
    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Build the claims for an assertion issued now.
    pub fn build_claims(&self) -> AssertionClaims {
        let iat = Utc::now().timestamp();
        AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }

    /// Sign an assertion issued now.
    pub fn sign_assertion(&self) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        encode(&header, &self.build_claims(), &self.encoding_key).map_err(|e| {
            AuthError::JwtSigningFailed {
                message: format!("Failed to encode JWT: {}", e),
            }
        })
    }
}

#[async_trait]
impl Authenticator for ServiceAccountAuthenticator {
    type Session = RemoteSession;

    async fn authenticate(&self) -> Result<RemoteSession, AuthError> {
        let assertion = self.sign_assertion()?;

        debug!(
            client_email = %self.client_email,
            token_uri = %self.token_uri,
            "Exchanging service account assertion for access token"
        );

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            warn!(status = status.as_u16(), "Token endpoint rejected assertion");
            return Err(AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                message,
            });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidCredentials {
                message: format!("Failed to parse token response: {}", e),
            })?;

        debug!(expires_in = token.expires_in, "Access token issued");

        Ok(RemoteSession::new(
            self.http_client.clone(),
            token.access_token,
            self.api_base_url.clone(),
        ))
    }
}

impl std::fmt::Debug for ServiceAccountAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuthenticator")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Parse a PEM private key into a signing key.
///
/// Provider keys are PKCS#8; PKCS#1 is accepted as well. Both are normalized
/// to PKCS#1 DER, which is what the RS256 signer expects.
fn encoding_key_from_pem(pem: &str) -> Result<EncodingKey, AuthError> {
    let pem = pem.trim();

    if !pem.contains("-----BEGIN") || !pem.contains("-----END") {
        return Err(AuthError::InvalidPrivateKey {
            message: "Invalid PEM format: missing BEGIN/END markers".to_string(),
        });
    }

    let key = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| AuthError::InvalidPrivateKey {
            message: format!("Failed to parse RSA private key: {}", e),
        })?;

    let der = key
        .to_pkcs1_der()
        .map_err(|e| AuthError::InvalidPrivateKey {
            message: format!("Failed to encode RSA private key: {}", e),
        })?;

    Ok(EncodingKey::from_rsa_der(der.as_bytes()))
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
