//! Where certificates live relative to their keys.
//!
//! OpenSSH looks for a certificate next to the private key it belongs to:
//!
//! ```text
//! id_ed25519          private key
//! id_ed25519.pub      public key
//! id_ed25519-cert.pub certificate
//! ```
//!
//! The transformation only touches the file name, so directories whose names
//! happen to contain `.pub` are left alone.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::keystore::PUBLIC_KEY_SUFFIX;

/// File name suffix of certificates.
pub const CERT_SUFFIX: &str = "-cert.pub";

/// `id_ed25519.pub` → `id_ed25519-cert.pub`.
pub fn cert_path_for(public_key_path: &Path) -> Result<PathBuf> {
    let stem = strip_name_suffix(public_key_path, PUBLIC_KEY_SUFFIX)?;
    Ok(public_key_path.with_file_name(format!("{stem}{CERT_SUFFIX}")))
}

/// `id_ed25519-cert.pub` → `id_ed25519`.
pub fn private_key_path_for(cert_path: &Path) -> Result<PathBuf> {
    let stem = strip_name_suffix(cert_path, CERT_SUFFIX)?;
    Ok(cert_path.with_file_name(stem))
}

fn strip_name_suffix<'a>(path: &'a Path, suffix: &str) -> Result<&'a str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| Error::KeyPath(path.to_path_buf()))
}
