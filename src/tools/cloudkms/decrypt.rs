//! `cloudkms-decrypt`: decrypt a secret back to plaintext.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use super::{start, write_file, KeyArgs, ToolError};
use crate::context::Context;
use crate::log::{Client as LogClient, Field};
use crate::secrets::{self, Kms, Secret};

/// Decrypt a Cloud KMS secret.
#[derive(Debug, Clone, Parser, Serialize)]
#[command(name = "cloudkms-decrypt")]
pub struct DecryptArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub key: KeyArgs,

    /// Base64 ciphertext to be decrypted. Required if no `path-to-file` given
    #[arg(long, default_value = "")]
    pub ciphertext: String,

    /// File extension used when saving the plaintext
    #[arg(long, alias = "saveAsFileType", default_value = "json")]
    pub save_as_file_type: String,
}

impl Default for DecryptArgs {
    fn default() -> Self {
        Self {
            key: KeyArgs::default(),
            ciphertext: String::new(),
            save_as_file_type: "json".to_string(),
        }
    }
}

/// What a decrypt run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub plaintext: Vec<u8>,
    pub saved_to: Option<PathBuf>,
}

/// `<domain>_<type>_plaintext.<file type>`
pub fn plaintext_file_name(domain: &str, secret_type: &str, file_type: &str) -> String {
    format!("{domain}_{secret_type}_plaintext.{file_type}")
}

/// Decrypt the ciphertext (or secret file) and optionally save it in `save_dir`.
pub async fn run<K: Kms>(
    ctx: &Context,
    log: Arc<dyn LogClient>,
    args: &DecryptArgs,
    kms: K,
    save_dir: &Path,
) -> Result<Decrypted, ToolError> {
    log.info(ctx, "Starting", &[Field::any("args", args)]);
    let client = start(ctx, &log, &args.ciphertext, "ciphertext", &args.key, kms)?;

    let secret = if args.key.path_to_file.is_empty() {
        Secret {
            ciphertext: args.ciphertext.clone(),
            key_name: client.config().key_name(),
        }
    } else {
        let secret = secrets::secret_from_file(&args.key.path_to_file)?;
        log.info(ctx, "Loaded from file", &[Field::any("secret", &secret)]);
        secret
    };

    log.info(ctx, "Decrypting", &[Field::any("secret", &secret)]);
    let plaintext = client.decrypt(ctx, &secret).await?;
    log.info(ctx, "Decrypted", &[Field::bytes("plaintext", &plaintext)]);

    let saved_to = match args.key.save_as() {
        Some((domain, secret_type)) => {
            let path = save_dir.join(plaintext_file_name(
                domain,
                secret_type,
                &args.save_as_file_type,
            ));
            write_file(&path, &plaintext).await?;
            log.info(ctx, "Saved", &[Field::string("path", &path.display().to_string())]);
            Some(path)
        }
        None => None,
    };

    Ok(Decrypted {
        plaintext,
        saved_to,
    })
}
