//! Cloud KMS encrypt tool.

use std::sync::Arc;

use clap::Parser;

use service_commons::context;
use service_commons::environment::Environment;
use service_commons::log::{self, Client, Field, TracingClient};
use service_commons::secrets::{token_source_from_env, CloudKms};
use service_commons::tools::cloudkms::{exe_dir, encrypt::{self, EncryptArgs}};

#[tokio::main]
async fn main() {
    let args = EncryptArgs::parse();

    let env = match Environment::new("Encrypt") {
        Ok(env) => env,
        Err(err) => {
            eprintln!("Failed generating new environment: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = log::init(&env) {
        eprintln!("Failed initializing tracing: {err}");
        std::process::exit(1);
    }

    let ctx = context::start_up();
    let log_client: Arc<dyn Client> = Arc::new(TracingClient::new(&ctx, log::Config { env }));

    let result = async {
        let kms = CloudKms::new(token_source_from_env()?)?;
        let save_dir = exe_dir()?;
        encrypt::run(&ctx, Arc::clone(&log_client), &args, kms, &save_dir).await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    }
    .await;

    if let Err(err) = result {
        log_client.fatal(&ctx, "Failed to encrypt", &[Field::error(err.as_ref())]);
        std::process::exit(1);
    }
}
