//! Command line tools for Cloud KMS secrets.
//!
//! # Responsibilities
//! - Parse and check the flags shared by `cloudkms-encrypt` and
//!   `cloudkms-decrypt`
//! - Build the secrets client from flags
//! - Resolve where output files are saved
//!
//! # Design Decisions
//! - `run` functions are generic over `Kms` and return the outcome, so
//!   binaries only wire up logging, the real KMS and the exit code
//! - Output files land next to the executable

pub mod decrypt;
pub mod encrypt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use thiserror::Error;

use crate::context::Context;
use crate::log::Client as LogClient;
use crate::secrets::{self, Kms, SecretsError};

/// Flag check failures. Messages name the flags as users know them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("Either `{0}` or `pathToFile` flag values must be provided, not both")]
    EitherInputOrFile(&'static str),

    #[error("Both or neither `saveAsSecretDomain` and `saveAsSecretType` flag values must be provided")]
    SaveAsPair,

    #[error("Missing `{0}` flag value")]
    Missing(&'static str),
}

/// Errors from running a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed flag check: {0}")]
    Flags(#[from] FlagError),

    #[error(transparent)]
    Secrets(#[from] SecretsError),

    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to get directory of process: {0}")]
    ExeDir(#[source] std::io::Error),
}

/// Flags shared by both tools.
#[derive(Debug, Clone, Default, Args, Serialize)]
pub struct KeyArgs {
    /// Cloud KMS key to use
    #[arg(long, alias = "cloudkmsKey", default_value = "")]
    pub cloudkms_key: String,

    /// Cloud KMS key ring to use
    #[arg(long, alias = "cloudkmsKeyRing", default_value = "")]
    pub cloudkms_key_ring: String,

    /// Friendly environment name, used for file naming
    #[arg(long, default_value = "dev")]
    pub env: String,

    /// GCP project ID which has Cloud KMS
    #[arg(long, alias = "gcpProjectId", default_value = "")]
    pub gcp_project_id: String,

    /// Path to the input file. Required if no value flag is given
    #[arg(long, alias = "pathToFile", default_value = "")]
    pub path_to_file: String,

    /// Optional secret domain used in the saved file name, requires `save-as-secret-type`
    #[arg(long, alias = "saveAsSecretDomain", default_value = "")]
    pub save_as_secret_domain: String,

    /// Optional secret type used in the saved file name, requires `save-as-secret-domain`
    #[arg(long, alias = "saveAsSecretType", default_value = "")]
    pub save_as_secret_type: String,
}

impl KeyArgs {
    /// Secrets client configuration from the flags.
    pub fn secrets_config(&self) -> secrets::Config {
        secrets::Config {
            env: self.env.clone(),
            gcp_project_id: self.gcp_project_id.clone(),
            cloudkms_key: self.cloudkms_key.clone(),
            cloudkms_key_ring: self.cloudkms_key_ring.clone(),
            ..Default::default()
        }
    }

    /// Domain and type to save under, when both were given.
    pub fn save_as(&self) -> Option<(&str, &str)> {
        if self.save_as_secret_domain.is_empty() {
            None
        } else {
            Some((
                self.save_as_secret_domain.as_str(),
                self.save_as_secret_type.as_str(),
            ))
        }
    }
}

/// Check flags in order; the first failure wins.
///
/// `value` is the inline input (plaintext or ciphertext), named `value_flag`.
pub fn check_required_flags(
    value: &str,
    value_flag: &'static str,
    args: &KeyArgs,
) -> Result<(), FlagError> {
    if value.is_empty() == args.path_to_file.is_empty() {
        return Err(FlagError::EitherInputOrFile(value_flag));
    }
    if args.save_as_secret_domain.is_empty() != args.save_as_secret_type.is_empty() {
        return Err(FlagError::SaveAsPair);
    }
    let required = [
        ("env", &args.env),
        ("gcpProjectId", &args.gcp_project_id),
        ("cloudkmsKey", &args.cloudkms_key),
        ("cloudkmsKeyRing", &args.cloudkms_key_ring),
    ];
    match required.iter().find(|(_, value)| value.is_empty()) {
        Some((flag, _)) => Err(FlagError::Missing(*flag)),
        None => Ok(()),
    }
}

/// Log, check flags and build the secrets client.
fn start<K: Kms>(
    ctx: &Context,
    log: &Arc<dyn LogClient>,
    value: &str,
    value_flag: &'static str,
    args: &KeyArgs,
    kms: K,
) -> Result<secrets::Client<K>, ToolError> {
    log.info(ctx, "Checking required flags", &[]);
    check_required_flags(value, value_flag, args)?;
    log.info(ctx, "Passed flag check", &[]);

    log.info(ctx, "Creating secrets client", &[]);
    let client = secrets::Client::new(ctx, args.secrets_config(), Arc::clone(log), kms)?;
    log.info(ctx, "Created secrets client", &[]);
    Ok(client)
}

/// Absolute directory of the running executable.
pub fn exe_dir() -> Result<PathBuf, ToolError> {
    let exe = std::env::current_exe().map_err(ToolError::ExeDir)?;
    match exe.parent() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(PathBuf::from(".")),
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ToolError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> KeyArgs {
        KeyArgs {
            cloudkms_key: "key".to_string(),
            cloudkms_key_ring: "ring".to_string(),
            env: "dev".to_string(),
            gcp_project_id: "project".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_check_required_flags() {
        let cases: Vec<(&str, &str, KeyArgs, Result<(), FlagError>)> = vec![
            ("value only", "x", args(), Ok(())),
            (
                "file only",
                "",
                KeyArgs {
                    path_to_file: "in.txt".to_string(),
                    ..args()
                },
                Ok(()),
            ),
            (
                "neither value nor file",
                "",
                args(),
                Err(FlagError::EitherInputOrFile("plaintext")),
            ),
            (
                "both value and file",
                "x",
                KeyArgs {
                    path_to_file: "in.txt".to_string(),
                    ..args()
                },
                Err(FlagError::EitherInputOrFile("plaintext")),
            ),
            (
                "domain without type",
                "x",
                KeyArgs {
                    save_as_secret_domain: "db".to_string(),
                    ..args()
                },
                Err(FlagError::SaveAsPair),
            ),
            (
                "type without domain",
                "x",
                KeyArgs {
                    save_as_secret_type: "password".to_string(),
                    ..args()
                },
                Err(FlagError::SaveAsPair),
            ),
            (
                "both save as",
                "x",
                KeyArgs {
                    save_as_secret_domain: "db".to_string(),
                    save_as_secret_type: "password".to_string(),
                    ..args()
                },
                Ok(()),
            ),
            (
                "missing env",
                "x",
                KeyArgs {
                    env: String::new(),
                    ..args()
                },
                Err(FlagError::Missing("env")),
            ),
            (
                "missing project",
                "x",
                KeyArgs {
                    gcp_project_id: String::new(),
                    ..args()
                },
                Err(FlagError::Missing("gcpProjectId")),
            ),
            (
                "missing key",
                "x",
                KeyArgs {
                    cloudkms_key: String::new(),
                    ..args()
                },
                Err(FlagError::Missing("cloudkmsKey")),
            ),
            (
                "missing key ring",
                "x",
                KeyArgs {
                    cloudkms_key_ring: String::new(),
                    ..args()
                },
                Err(FlagError::Missing("cloudkmsKeyRing")),
            ),
            (
                "first failure wins",
                "",
                KeyArgs {
                    save_as_secret_domain: "db".to_string(),
                    env: String::new(),
                    ..args()
                },
                Err(FlagError::EitherInputOrFile("plaintext")),
            ),
        ];

        for (desc, value, args, expected) in cases {
            assert_eq!(check_required_flags(value, "plaintext", &args), expected, "{desc}");
        }
    }

    #[test]
    fn test_flag_error_messages() {
        assert_eq!(
            FlagError::EitherInputOrFile("ciphertext").to_string(),
            "Either `ciphertext` or `pathToFile` flag values must be provided, not both"
        );
        assert_eq!(
            FlagError::SaveAsPair.to_string(),
            "Both or neither `saveAsSecretDomain` and `saveAsSecretType` flag values must be provided"
        );
        assert_eq!(
            FlagError::Missing("cloudkmsKeyRing").to_string(),
            "Missing `cloudkmsKeyRing` flag value"
        );
    }

    #[test]
    fn test_save_as() {
        assert_eq!(args().save_as(), None);
        let args = KeyArgs {
            save_as_secret_domain: "db".to_string(),
            save_as_secret_type: "password".to_string(),
            ..args()
        };
        assert_eq!(args.save_as(), Some(("db", "password")));
    }

    #[test]
    fn test_secrets_config() {
        let config = args().secrets_config();
        assert_eq!(
            config.key_name(),
            "projects/project/locations/global/keyRings/ring/cryptoKeys/key"
        );
        assert_eq!(config.env, "dev");
    }

    #[test]
    fn test_exe_dir() {
        assert!(exe_dir().unwrap().is_dir());
    }
}
