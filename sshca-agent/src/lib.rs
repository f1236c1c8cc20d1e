//! Agent side of `get-cert`.
//!
//! Puts a freshly fetched certificate's key into the user's running
//! `ssh-agent` for exactly as long as the certificate is valid.
//!
//! # Flow
//!
//! ```text
//! install()
//!   │
//!   ├─ AgentConnector::connect()       SSH_AUTH_SOCK, fatal on failure
//!   ├─ CredentialAgent::remove_identity()   best effort, result ignored
//!   ├─ remaining_ttl()                 < 1s left → Expired, stop
//!   └─ IdentityAdder::add_identity()   ssh-add -t <ttl> <key>, fatal on failure
//! ```
//!
//! Both seams are traits so the flow can be exercised without a real agent.

pub mod install;
pub mod session;

pub use install::{IdentityAdder, InstallationRequest, SshAdd, install};
pub use session::{AUTH_SOCK_ENV, AgentConnector, CredentialAgent, SocketAgent, SocketConnector};
