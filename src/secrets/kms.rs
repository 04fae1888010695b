//! Cloud KMS access over its REST API.

use std::future::Future;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Public Cloud KMS endpoint.
pub const CLOUDKMS_BASE_URL: &str = "https://cloudkms.googleapis.com";

/// Token endpoint of the GCE metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Environment variable holding a pre-issued OAuth access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Errors talking to the KMS.
#[derive(Debug, Error)]
pub enum KmsError {
    #[error("KMS request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid KMS URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("KMS returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("KMS returned invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to obtain access token: {0}")]
    Token(String),
}

/// Symmetric encryption with a named key.
pub trait Kms: Send + Sync {
    fn encrypt(
        &self,
        key_name: &str,
        plaintext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, KmsError>> + Send;

    fn decrypt(
        &self,
        key_name: &str,
        ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, KmsError>> + Send;
}

/// Where bearer tokens come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    StaticToken(String),
    /// Token endpoint of a metadata server.
    MetadataServer(Url),
}

impl TokenSource {
    /// The GCE metadata server.
    pub fn metadata_server() -> Result<Self, KmsError> {
        Ok(Self::MetadataServer(Url::parse(METADATA_TOKEN_URL)?))
    }

    async fn token(&self, http: &reqwest::Client) -> Result<String, KmsError> {
        match self {
            Self::StaticToken(token) => Ok(token.clone()),
            Self::MetadataServer(url) => {
                let response = http
                    .get(url.clone())
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(KmsError::Token(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }
                let token: MetadataToken = response.json().await?;
                Ok(token.access_token)
            }
        }
    }
}

/// `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise the metadata server.
pub fn token_source_from_env() -> Result<TokenSource, KmsError> {
    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => Ok(TokenSource::StaticToken(token)),
        _ => TokenSource::metadata_server(),
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Serialize)]
struct EncryptRequest {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(default)]
    plaintext: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Cloud KMS REST client.
#[derive(Debug, Clone)]
pub struct CloudKms {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenSource,
}

impl CloudKms {
    pub fn new(tokens: TokenSource) -> Result<Self, KmsError> {
        Ok(Self::with_base_url(Url::parse(CLOUDKMS_BASE_URL)?, tokens))
    }

    /// Client for a non-default endpoint, such as an emulator.
    pub fn with_base_url(base_url: Url, tokens: TokenSource) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            tokens,
        }
    }

    fn method_url(&self, key_name: &str, method: &str) -> Result<Url, KmsError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/v1/{key_name}:{method}"))?)
    }

    async fn call<Req, Resp>(&self, url: Url, body: &Req) -> Result<Resp, KmsError>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let token = self.tokens.token(&self.http).await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(KmsError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

impl Kms for CloudKms {
    async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let url = self.method_url(key_name, "encrypt")?;
        let request = EncryptRequest {
            plaintext: STANDARD.encode(plaintext),
        };
        let response: EncryptResponse = self.call(url, &request).await?;
        Ok(STANDARD.decode(response.ciphertext)?)
    }

    async fn decrypt(&self, key_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let url = self.method_url(key_name, "decrypt")?;
        let request = DecryptRequest {
            ciphertext: STANDARD.encode(ciphertext),
        };
        let response: DecryptResponse = self.call(url, &request).await?;
        Ok(STANDARD.decode(response.plaintext)?)
    }
}
