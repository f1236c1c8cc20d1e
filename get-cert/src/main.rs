//! get-cert: fetch a signed SSH certificate and load its key into ssh-agent.
//!
//! ```text
//! get-cert [--environment <env>] <cert-request-id>
//! ```
//!
//! The certificate is written next to the matching public key in `~/.ssh`
//! and the private key is added to the agent with `ssh-add -t`, the lifetime
//! being whatever validity the certificate has left.

mod pipeline;

use std::process::ExitCode;
use std::time::SystemTime;

use anyhow::Result;
use clap::Parser;
use sshca_agent::{SocketConnector, SshAdd};
use sshca_core::config::{load_config, select_environment};
use sshca_core::{DirKeyStore, Error, SignerClient};
use tracing_subscriber::EnvFilter;

use crate::pipeline::{Installed, Pipeline, RunContext};

const USAGE: &str = "Usage: get-cert [--environment env] cert-request-id";

#[derive(Parser, Debug)]
#[command(
    name = "get-cert",
    about = "Fetch a signed SSH certificate and load its key into ssh-agent",
    disable_version_flag = true
)]
struct Args {
    /// The environment you want (e.g. prod).
    #[arg(long, short = 'e')]
    environment: Option<String>,

    /// Print the version and exit.
    #[arg(long)]
    version: bool,

    /// ID of a previously submitted certificate request.
    cert_request_id: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help goes to stdout and is not a failure.
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if args.version {
        println!("get-cert v.{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let Some(request_id) = args.cert_request_id.as_deref().filter(|id| !id.is_empty()) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    match run(&RunContext::from_env(), args.environment.as_deref(), request_id) {
        Ok(installed) => {
            tracing::debug!(
                cert = %installed.cert_path.display(),
                persisted = installed.persisted,
                ttl_secs = installed.request.ttl_secs,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(ctx: &RunContext, environment: Option<&str>, request_id: &str) -> Result<Installed> {
    let configs = load_config(&ctx.config_path()).map_err(Error::from)?;
    let config = select_environment(&configs, environment).map_err(Error::from)?;
    tracing::info!(environment = %config.environment, signer = %config.signer_url, "using environment");

    let pipeline = Pipeline {
        fetcher: SignerClient::new(config.signer_url)?,
        keys: DirKeyStore::for_home(&ctx.home),
        connector: SocketConnector::new(ctx.auth_sock.clone()),
        adder: SshAdd::default(),
    };
    Ok(pipeline.run(request_id, SystemTime::now)?)
}
