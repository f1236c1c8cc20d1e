//! Local public key store.
//!
//! The store is the user's `~/.ssh` directory: every `*.pub` file in it is a
//! candidate.  [`find_matching_key_path`] scans the candidates for the one
//! whose public key is byte-for-byte the key a certificate was issued for.
//!
//! Access goes through the [`KeySource`] trait so the matcher can run against
//! an in-memory store in tests.  Nothing is cached; every call rescans.

use std::path::{Path, PathBuf};

use ssh_key::PublicKey;
use ssh_key::public::KeyData;
use tracing::{debug, trace};

use crate::cert::{ParseError, ParsedKey, parse_authorized_key};
use crate::error::{Error, Result};

/// File name suffix of public keys in the store.
pub const PUBLIC_KEY_SUFFIX: &str = ".pub";

/// Something that can list and read public key files.
pub trait KeySource {
    /// Every entry in the store.  Order is whatever the store yields.
    fn entries(&self) -> Result<Vec<PathBuf>>;

    /// Raw contents of one entry.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// A directory of key files, normally `~/.ssh`.
#[derive(Debug, Clone)]
pub struct DirKeyStore {
    dir: PathBuf,
}

impl DirKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The `.ssh` directory under `home`.
    pub fn for_home(home: &Path) -> Self {
        Self::new(home.join(".ssh"))
    }
}

impl KeySource for DirKeyStore {
    fn entries(&self) -> Result<Vec<PathBuf>> {
        let dir_err = |source| Error::KeyStoreDir {
            path: self.dir.clone(),
            source,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(dir_err)? {
            let path = entry.map_err(dir_err)?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|source| Error::KeyRead {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A parsed candidate from the store.  Lives only for the duration of a scan.
#[derive(Debug, Clone)]
pub struct LocalKeyEntry {
    pub path: PathBuf,
    pub key: ParsedKey,
}

impl LocalKeyEntry {
    /// Canonical wire encoding of the entry's bare public key.
    ///
    /// Certificates stored next to their keys (`*-cert.pub`) have no bare
    /// encoding and never match.
    fn encoded_public_key(&self) -> Result<Option<Vec<u8>>> {
        match &self.key {
            ParsedKey::PublicKey(key) => Ok(Some(encode(key.key_data(), &self.path)?)),
            ParsedKey::Certificate(_) => Ok(None),
        }
    }
}

/// True if `path` names a public key file.
pub fn is_public_key_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PUBLIC_KEY_SUFFIX))
}

/// Public key files in `source`, read and parsed one at a time as the
/// iterator is advanced.
///
/// An unreadable or unparseable file yields an error; callers stop there.
/// Certificates without an expiry cannot be decoded and are left out, since
/// a certificate never matches anyway.
pub fn scan<S: KeySource>(source: &S) -> Result<impl Iterator<Item = Result<LocalKeyEntry>> + '_> {
    Ok(source
        .entries()?
        .into_iter()
        .filter(|p| is_public_key_path(p))
        .filter_map(move |path| load_entry(source, path).transpose()))
}

fn load_entry(source: &impl KeySource, path: PathBuf) -> Result<Option<LocalKeyEntry>> {
    let raw = source.read(&path)?;
    match parse_authorized_key(&raw) {
        Ok(key) => Ok(Some(LocalKeyEntry { path, key })),
        Err(ParseError::UnboundedValidity) => {
            debug!(path = %path.display(), "skipping certificate without expiry");
            Ok(None)
        }
        Err(source) => Err(Error::KeyParse { path, source }),
    }
}

/// Find the public key file whose key is exactly `target`.
///
/// Candidates are compared on their full wire encoding, so a key only
/// matches itself: same-type keys with different material and certificates
/// wrapping the same key are both rejected.  The first match in enumeration
/// order wins.
pub fn find_matching_key_path(source: &impl KeySource, target: &KeyData) -> Result<PathBuf> {
    let wanted = encode(target, Path::new("<certificate>"))?;

    for entry in scan(source)? {
        let entry = entry?;
        trace!(path = %entry.path.display(), "comparing local key");
        if entry.encoded_public_key()?.as_deref() == Some(wanted.as_slice()) {
            debug!(path = %entry.path.display(), "found local key for certificate");
            return Ok(entry.path);
        }
    }

    Err(Error::KeyNotFound)
}

fn encode(key: &KeyData, path: &Path) -> Result<Vec<u8>> {
    PublicKey::from(key.clone())
        .to_bytes()
        .map_err(|e| Error::KeyParse {
            path: path.to_path_buf(),
            source: e.into(),
        })
}
