//! Loading a certified key into the agent with a bounded lifetime.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use ssh_key::Certificate;
use sshca_core::cert::remaining_ttl;
use sshca_core::paths::private_key_path_for;
use sshca_core::{Error, Result};
use tracing::{debug, info};

use crate::session::{AgentConnector, CredentialAgent};

/// What gets handed to the agent: a private key and how long to keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRequest {
    pub private_key_path: PathBuf,
    /// Always at least one second.
    pub ttl_secs: u64,
}

/// Adds a private key to the agent.
pub trait IdentityAdder {
    fn add_identity(&self, request: &InstallationRequest) -> Result<()>;
}

/// Runs `ssh-add -t <ttl> <key>` with the caller's terminal attached, so a
/// passphrase prompt reaches the user.
#[derive(Debug, Clone)]
pub struct SshAdd {
    program: OsString,
}

impl Default for SshAdd {
    fn default() -> Self {
        Self::new("ssh-add")
    }
}

impl SshAdd {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn command(&self, request: &InstallationRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-t")
            .arg(request.ttl_secs.to_string())
            .arg(&request.private_key_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl IdentityAdder for SshAdd {
    fn add_identity(&self, request: &InstallationRequest) -> Result<()> {
        let program = self.program.to_string_lossy();
        let status = self
            .command(request)
            .status()
            .map_err(|e| Error::Install(format!("cannot run {program}: {e}")))?;
        if !status.success() {
            return Err(Error::Install(format!("{program} exited with {status}")));
        }
        Ok(())
    }
}

/// Replace whatever the agent holds for `cert`'s key with the private key
/// next to `cert_path`, valid until the certificate expires.
///
/// Steps, each fatal on failure except the removal:
/// 1. connect to the agent
/// 2. remove the key (result ignored)
/// 3. derive the private key path from `cert_path`
/// 4. compute the TTL from a fresh `now()` reading; less than a second left
///    is [`Error::Expired`] and nothing is added
/// 5. add the key through `adder`
pub fn install<C, A>(
    connector: &C,
    adder: &A,
    cert: &Certificate,
    cert_path: &Path,
    now: impl Fn() -> SystemTime,
) -> Result<InstallationRequest>
where
    C: AgentConnector,
    A: IdentityAdder,
{
    let mut agent = connector.connect()?;
    let _ = agent.remove_identity(cert.public_key());

    let private_key_path = private_key_path_for(cert_path)?;
    let ttl_secs = remaining_ttl(cert, now())?;
    let request = InstallationRequest {
        private_key_path,
        ttl_secs,
    };

    debug!(
        key = %request.private_key_path.display(),
        ttl_secs,
        "adding identity to agent"
    );
    adder.add_identity(&request)?;
    info!(key = %request.private_key_path.display(), ttl_secs, "identity added");
    Ok(request)
}
