//! Secrets encrypted with a cloud KMS.
//!
//! # Data Flow
//! ```text
//! plaintext ─▶ Client::encrypt ─▶ Kms ─▶ Secret { ciphertext (base64), key_name }
//!                                           │
//!                                           ▼
//!                            <domain>_<type>_cloudkms-<env>.json
//!                                           │
//!                                           ▼
//!          Client::load_required ─▶ Client::decrypt ─▶ Kms ─▶ plaintext
//! ```
//!
//! # Design Decisions
//! - The KMS sits behind the `Kms` trait; `CloudKms` is the REST implementation
//! - Secrets remember the key that produced them; an empty key name falls
//!   back to the configured key

mod kms;

pub use kms::{
    token_source_from_env, CloudKms, Kms, KmsError, TokenSource, ACCESS_TOKEN_ENV,
    CLOUDKMS_BASE_URL, METADATA_TOKEN_URL,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;
use crate::log::{Client as LogClient, Field};

/// Default Cloud KMS location.
pub const LOCATION_DEFAULT: &str = "global";

/// Errors from secret handling.
#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid secret JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ciphertext is not base64: {0}")]
    Ciphertext(#[from] base64::DecodeError),

    #[error(transparent)]
    Kms(#[from] KmsError),

    #[error("Invalid secrets config: missing {0}")]
    Config(&'static str),
}

/// Ciphertext and the key that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Standard base64.
    pub ciphertext: String,
    #[serde(default)]
    pub key_name: String,
}

impl Secret {
    /// Write as tab-indented JSON.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), SecretsError> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        std::fs::write(path, buf).map_err(|source| SecretsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read a secret written by [`Secret::to_file`].
pub fn secret_from_file(path: impl AsRef<Path>) -> Result<Secret, SecretsError> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|source| SecretsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Secret types required per domain, e.g. `{"database": ["password"]}`.
pub type Required = BTreeMap<String, Vec<String>>;

/// Merge requirement sets. Types keep first-seen order without duplicates.
pub fn reduce_required(required: &[Required]) -> Required {
    let mut reduced = Required::new();
    for set in required {
        for (domain, types) in set {
            let merged = reduced.entry(domain.clone()).or_default();
            for secret_type in types {
                if !merged.contains(secret_type) {
                    merged.push(secret_type.clone());
                }
            }
        }
    }
    reduced
}

/// KMS key and naming settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Friendly environment name used in file names.
    pub env: String,
    pub gcp_project_id: String,
    pub cloudkms_key: String,
    pub cloudkms_key_ring: String,
    pub location: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: String::new(),
            gcp_project_id: String::new(),
            cloudkms_key: String::new(),
            cloudkms_key_ring: String::new(),
            location: LOCATION_DEFAULT.to_string(),
        }
    }
}

impl Config {
    /// Full resource name of the configured crypto key.
    pub fn key_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.gcp_project_id, self.location, self.cloudkms_key_ring, self.cloudkms_key
        )
    }

    fn check(&self) -> Result<(), SecretsError> {
        let required = [
            ("env", &self.env),
            ("gcp_project_id", &self.gcp_project_id),
            ("cloudkms_key_ring", &self.cloudkms_key_ring),
            ("cloudkms_key", &self.cloudkms_key),
            ("location", &self.location),
        ];
        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(SecretsError::Config(*name)),
            None => Ok(()),
        }
    }
}

/// Plaintexts by domain, then secret type.
pub type Loaded = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// Encrypts and decrypts secrets with one KMS key.
pub struct Client<K> {
    config: Config,
    log: Arc<dyn LogClient>,
    kms: K,
}

impl<K: Kms> Client<K> {
    pub fn new(
        ctx: &Context,
        config: Config,
        log: Arc<dyn LogClient>,
        kms: K,
    ) -> Result<Self, SecretsError> {
        log.info(ctx, "Initializing", &[Field::any("config", &config)]);
        config.check()?;
        log.info(ctx, "Initialized", &[]);
        Ok(Self { config, log, kms })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn encrypt(&self, ctx: &Context, plaintext: &[u8]) -> Result<Secret, SecretsError> {
        let key_name = self.config.key_name();
        self.log.info(ctx, "Encrypting", &[Field::string("key_name", &key_name)]);
        let ciphertext = self.kms.encrypt(&key_name, plaintext).await?;
        let secret = Secret {
            ciphertext: STANDARD.encode(ciphertext),
            key_name,
        };
        self.log.info(ctx, "Encrypted", &[]);
        Ok(secret)
    }

    pub async fn decrypt(&self, ctx: &Context, secret: &Secret) -> Result<Vec<u8>, SecretsError> {
        let key_name = if secret.key_name.is_empty() {
            self.config.key_name()
        } else {
            secret.key_name.clone()
        };
        self.log.info(ctx, "Decrypting", &[Field::string("key_name", &key_name)]);
        let ciphertext = STANDARD.decode(&secret.ciphertext)?;
        let plaintext = self.kms.decrypt(&key_name, &ciphertext).await?;
        self.log.info(ctx, "Decrypted", &[]);
        Ok(plaintext)
    }

    /// `<domain>_<type>_cloudkms-<env>.json`
    pub fn file_name(&self, domain: &str, secret_type: &str) -> String {
        format!("{domain}_{secret_type}_cloudkms-{}.json", self.config.env)
    }

    /// Decrypt every required secret from its file in `dir`.
    pub async fn load_required(
        &self,
        ctx: &Context,
        dir: &Path,
        required: &Required,
    ) -> Result<Loaded, SecretsError> {
        self.log.info(ctx, "Loading required secrets", &[Field::any("required", required)]);
        let mut loaded = Loaded::new();
        for (domain, types) in required {
            for secret_type in types {
                let path = dir.join(self.file_name(domain, secret_type));
                let secret = secret_from_file(&path)?;
                let plaintext = self.decrypt(ctx, &secret).await?;
                loaded
                    .entry(domain.clone())
                    .or_default()
                    .insert(secret_type.clone(), plaintext);
            }
        }
        self.log.info(ctx, "Loaded required secrets", &[]);
        Ok(loaded)
    }
}
