//! The fetch → parse → match → persist → install sequence.
//!
//! Every step runs to completion before the next one starts and every
//! failure is fatal, with one exception: a certificate that cannot be written
//! to disk is reported and the install goes ahead anyway.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::SystemTime;

use sshca_agent::{AgentConnector, IdentityAdder, InstallationRequest};
use sshca_core::cert::{describe, parse_certificate, remaining_ttl};
use sshca_core::config::default_config_path;
use sshca_core::keystore::find_matching_key_path;
use sshca_core::persist::{PersistOutcome, persist};
use sshca_core::{CertFetcher, KeySource, Result};
use tracing::{debug, warn};

/// Process environment the pipeline depends on, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub home: PathBuf,
    pub auth_sock: Option<PathBuf>,
}

impl RunContext {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var_os("HOME"),
            std::env::var_os(sshca_agent::AUTH_SOCK_ENV),
        )
    }

    /// Unset and empty values are treated alike; home falls back to `/`.
    pub fn from_vars(home: Option<OsString>, auth_sock: Option<OsString>) -> Self {
        let non_empty = |v: Option<OsString>| v.filter(|s| !s.is_empty()).map(PathBuf::from);
        Self {
            home: non_empty(home).unwrap_or_else(|| PathBuf::from("/")),
            auth_sock: non_empty(auth_sock),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        default_config_path(Some(&self.home))
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct Installed {
    pub cert_path: PathBuf,
    pub persisted: bool,
    pub request: InstallationRequest,
}

/// The collaborators of one run.
pub struct Pipeline<F, S, C, A> {
    pub fetcher: F,
    pub keys: S,
    pub connector: C,
    pub adder: A,
}

impl<F, S, C, A> Pipeline<F, S, C, A>
where
    F: CertFetcher,
    S: KeySource,
    C: AgentConnector,
    A: IdentityAdder,
{
    /// `now` is read after every step that can block, never up front: the
    /// fetch has no timeout and the certificate may expire while it waits.
    pub fn run(&self, request_id: &str, now: impl Fn() -> SystemTime) -> Result<Installed> {
        let raw = self.fetcher.fetch(request_id)?;
        let cert = parse_certificate(&raw)?;
        debug!(key_id = cert.key_id(), serial = cert.serial(), "parsed certificate");

        let public_key_path = find_matching_key_path(&self.keys, cert.public_key())?;

        let outcome = persist(&raw, &public_key_path)?;
        if let PersistOutcome::Failed { error, .. } = &outcome {
            warn!("{error}");
            eprintln!("{error}");
        }

        remaining_ttl(&cert, now())?;
        println!("{}", describe(&cert));

        let request = sshca_agent::install(&self.connector, &self.adder, &cert, outcome.path(), &now)?;
        Ok(Installed {
            cert_path: outcome.path().to_path_buf(),
            persisted: outcome.is_written(),
            request,
        })
    }
}
