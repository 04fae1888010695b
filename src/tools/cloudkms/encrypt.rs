//! `cloudkms-encrypt`: encrypt plaintext into a secret file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use super::{start, KeyArgs, ToolError};
use crate::context::Context;
use crate::log::{Client as LogClient, Field};
use crate::secrets::{Kms, Secret};

/// Encrypt plaintext with Cloud KMS.
#[derive(Debug, Clone, Default, Parser, Serialize)]
#[command(name = "cloudkms-encrypt")]
pub struct EncryptArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub key: KeyArgs,

    /// Plaintext to be encrypted. Required if no `path-to-file` given
    #[arg(long, default_value = "")]
    pub plaintext: String,
}

/// What an encrypt run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encrypted {
    pub secret: Secret,
    pub saved_to: Option<PathBuf>,
}

/// Encrypt the plaintext (or file) and optionally save the secret in `save_dir`.
pub async fn run<K: Kms>(
    ctx: &Context,
    log: Arc<dyn LogClient>,
    args: &EncryptArgs,
    kms: K,
    save_dir: &Path,
) -> Result<Encrypted, ToolError> {
    log.info(ctx, "Starting", &[Field::any("args", args)]);
    let client = start(ctx, &log, &args.plaintext, "plaintext", &args.key, kms)?;

    let plaintext = if args.key.path_to_file.is_empty() {
        args.plaintext.as_bytes().to_vec()
    } else {
        let path = Path::new(&args.key.path_to_file);
        let plaintext = tokio::fs::read(path).await.map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log.info(ctx, "Loaded from file", &[Field::string("path", &args.key.path_to_file)]);
        plaintext
    };

    let secret = client.encrypt(ctx, &plaintext).await?;
    log.info(ctx, "Encrypted", &[Field::any("secret", &secret)]);

    let saved_to = match args.key.save_as() {
        Some((domain, secret_type)) => {
            let path = save_dir.join(client.file_name(domain, secret_type));
            secret.to_file(&path)?;
            log.info(ctx, "Saved", &[Field::string("path", &path.display().to_string())]);
            Some(path)
        }
        None => None,
    };

    Ok(Encrypted { secret, saved_to })
}
