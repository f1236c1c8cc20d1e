//! Error types shared by every stage of the certificate pipeline.

use std::io;
use std::path::PathBuf;

use crate::cert::ParseError;
use crate::config::ConfigError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("didn't get a valid response: {0}")]
    Network(#[source] reqwest::Error),

    /// The signer answered with a non-success status.  `body` is the
    /// service's own explanation and is shown to the user unchanged.
    #[error("error getting that request id: {body}")]
    Rejected { status: u16, body: String },

    #[error("trouble parsing response: {0}")]
    Parse(#[from] ParseError),

    #[error("could not read your .ssh directory {}: {source}", path.display())]
    KeyStoreDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trouble reading public key {}: {source}", path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trouble parsing public key {}: {source}", path.display())]
    KeyParse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("couldn't find ssh key for cert")]
    KeyNotFound,

    #[error("{} is not a public key path", .0.display())]
    KeyPath(PathBuf),

    #[error("couldn't write certificate file to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("this certificate has already expired (valid before {valid_before})")]
    Expired { valid_before: u64 },

    #[error("SSH_AUTH_SOCK is not set, is ssh-agent running?")]
    AgentSocketUnset,

    #[error("dial failed: {}: {source}", path.display())]
    AgentConnect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("agent request failed: {0}")]
    AgentRequest(String),

    #[error("error in ssh-add: {0}")]
    Install(String),
}
