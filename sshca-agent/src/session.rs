//! Connection to the user's running SSH agent.
//!
//! Only "remove identity" is spoken directly over the agent protocol; adding
//! the key is left to `ssh-add` (see [`crate::install`]) so that passphrase
//! prompts work.  The agent client from `ssh_agent_lib` is async, so each
//! connection carries its own single-threaded runtime and blocks on it.

use std::fmt;
use std::path::PathBuf;

use ssh_agent_lib::agent::Session as _;
use ssh_agent_lib::client::Client;
use ssh_agent_lib::proto::RemoveIdentity;
use ssh_key::public::KeyData;
use sshca_core::{Error, Result};
use tokio::net::UnixStream;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Environment variable naming the agent socket.
pub const AUTH_SOCK_ENV: &str = "SSH_AUTH_SOCK";

/// The agent operations the pipeline needs.
pub trait CredentialAgent {
    /// Ask the agent to forget `key`.
    ///
    /// Callers may ignore the result: an agent that never held the key
    /// answers with a failure, and that is not something the user can act on.
    fn remove_identity(&mut self, key: &KeyData) -> Result<()>;
}

/// Opens connections to an agent.
pub trait AgentConnector {
    type Agent: CredentialAgent;

    fn connect(&self) -> Result<Self::Agent>;
}

/// Connects to the agent listening on a Unix socket.
#[derive(Debug, Clone)]
pub struct SocketConnector {
    socket_path: Option<PathBuf>,
}

impl SocketConnector {
    /// `socket_path` is normally the value of [`AUTH_SOCK_ENV`]; `None` means
    /// no agent is available and every connect fails.
    pub fn new(socket_path: Option<PathBuf>) -> Self {
        Self { socket_path }
    }
}

impl AgentConnector for SocketConnector {
    type Agent = SocketAgent;

    fn connect(&self) -> Result<SocketAgent> {
        let path = self.socket_path.as_ref().ok_or(Error::AgentSocketUnset)?;
        let connect_err = |source| Error::AgentConnect {
            path: path.clone(),
            source,
        };

        let runtime = Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(connect_err)?;
        let stream = runtime
            .block_on(UnixStream::connect(path))
            .map_err(connect_err)?;

        debug!(sock = %path.display(), "connected to ssh-agent");
        Ok(SocketAgent {
            runtime,
            client: Client::new(stream),
        })
    }
}

/// A live agent connection.
pub struct SocketAgent {
    runtime: Runtime,
    client: Client<UnixStream>,
}

impl fmt::Debug for SocketAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketAgent").finish_non_exhaustive()
    }
}

impl CredentialAgent for SocketAgent {
    fn remove_identity(&mut self, key: &KeyData) -> Result<()> {
        let request = RemoveIdentity {
            pubkey: key.clone(),
        };
        self.runtime
            .block_on(self.client.remove_identity(request))
            .map_err(|e| Error::AgentRequest(format!("remove identity: {e}")))
    }
}
