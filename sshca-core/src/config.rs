//! Requester configuration.
//!
//! The config file is a JSON object keyed by environment name, shared with
//! the other ssh-cert-authority client tools:
//!
//! ```json
//! {
//!   "prod":    { "SignerUrl": "https://ca.example.com/" },
//!   "staging": { "SignerUrl": "https://ca-staging.example.com/" }
//! }
//! ```
//!
//! Exactly one environment is active per run.  When the file holds a single
//! environment it is picked automatically; otherwise the caller must name one.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Location of the config file relative to the user's home directory.
pub const CONFIG_RELATIVE_PATH: &str = ".ssh_ca/requester_config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no environments are configured")]
    NoEnvironments,

    #[error("you must tell me which environment to use ({count} configured: {})", names.join(", "))]
    AmbiguousEnvironment { count: usize, names: Vec<String> },

    #[error("requested environment {0:?} not found in config file")]
    EnvironmentNotFound(String),

    #[error("environment {environment:?} has an invalid signer URL {url:?}: {reason}")]
    InvalidSignerUrl {
        environment: String,
        url: String,
        reason: String,
    },
}

/// One environment's entry in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    #[serde(rename = "SignerUrl", alias = "signer_url")]
    pub signer_url: String,

    /// Key used when submitting requests.  Not needed to fetch a certificate,
    /// kept so the shared config file round-trips.
    #[serde(
        rename = "PublicKeyPath",
        alias = "public_key_path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key_path: Option<String>,
}

/// All environments from the config file, ordered by name.
pub type RequesterConfigs = BTreeMap<String, EnvironmentEntry>;

/// The environment selected for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterConfig {
    pub environment: String,
    pub signer_url: String,
}

/// Config file path under `home`.
///
/// Falls back to `/` when no home directory is known.
pub fn default_config_path(home: Option<&Path>) -> PathBuf {
    home.unwrap_or_else(|| Path::new("/"))
        .join(CONFIG_RELATIVE_PATH)
}

pub fn load_config(path: &Path) -> Result<RequesterConfigs, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let configs: RequesterConfigs =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), environments = configs.len(), "loaded requester config");
    Ok(configs)
}

/// Return the only entry of `map`, or `None` unless it has exactly one.
pub fn sole_entry<K, V>(map: &BTreeMap<K, V>) -> Option<(&K, &V)> {
    if map.len() != 1 {
        return None;
    }
    map.iter().next()
}

/// Pick the active environment.
///
/// An explicit `requested` name always wins.  Without one, the config must
/// hold exactly one environment.
pub fn select_environment(
    configs: &RequesterConfigs,
    requested: Option<&str>,
) -> Result<RequesterConfig, ConfigError> {
    let (name, entry) = match requested.filter(|r| !r.is_empty()) {
        Some(name) => configs
            .get_key_value(name)
            .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_string()))?,
        None if configs.is_empty() => return Err(ConfigError::NoEnvironments),
        None => sole_entry(configs).ok_or_else(|| ConfigError::AmbiguousEnvironment {
            count: configs.len(),
            names: configs.keys().cloned().collect(),
        })?,
    };

    validate_signer_url(name, &entry.signer_url)?;
    debug!(environment = %name, signer = %entry.signer_url, "selected environment");

    Ok(RequesterConfig {
        environment: name.clone(),
        signer_url: entry.signer_url.clone(),
    })
}

fn validate_signer_url(environment: &str, url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSignerUrl {
        environment: environment.to_string(),
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}
