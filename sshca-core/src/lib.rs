//! Core of `get-cert`: everything between "here is a request ID" and "here is
//! the certificate and the key it belongs to".
//!
//! - **`config`**: requester config file and environment selection
//! - **`signer`**: blocking HTTP fetch from the signing service
//! - **`cert`**: `authorized_keys` decoding, validity checks, inspection
//! - **`keystore`**: scanning `~/.ssh` for the key a certificate was issued for
//! - **`paths`** / **`persist`**: certificate file naming and writing
//!
//! Installing into the running agent lives in `sshca-agent`.

pub mod cert;
pub mod config;
pub mod error;
pub mod keystore;
pub mod paths;
pub mod persist;
pub mod signer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cert::{ParseError, ParsedKey};
pub use config::{ConfigError, RequesterConfig};
pub use error::{Error, Result};
pub use keystore::{DirKeyStore, KeySource, LocalKeyEntry};
pub use persist::PersistOutcome;
pub use signer::{CertFetcher, SignerClient};
