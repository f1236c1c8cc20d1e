//! Writing fetched certificates to disk.
//!
//! A failed write does not stop the pipeline: the agent install matters more
//! than the file, so [`persist`] reports the failure through
//! [`PersistOutcome::Failed`] and leaves the decision to the caller.

use std::fs::{OpenOptions, Permissions};
use std::io::Write as _;
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::cert_path_for;

/// Mode of written certificates: owner read/write, everyone else read.
pub const CERT_FILE_MODE: u32 = 0o644;

#[derive(Debug)]
pub enum PersistOutcome {
    Written(PathBuf),
    Failed { path: PathBuf, error: Error },
}

impl PersistOutcome {
    /// Where the certificate was (or would have been) written.
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(path) | Self::Failed { path, .. } => path,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Write `cert_bytes` next to the public key at `public_key_path`.
///
/// Only a path that cannot be turned into a certificate path is an `Err`;
/// I/O failures come back as [`PersistOutcome::Failed`].
pub fn persist(cert_bytes: &[u8], public_key_path: &Path) -> Result<PersistOutcome> {
    let path = cert_path_for(public_key_path)?;
    Ok(match write_certificate(&path, cert_bytes) {
        Ok(()) => {
            debug!(path = %path.display(), bytes = cert_bytes.len(), "wrote certificate");
            PersistOutcome::Written(path)
        }
        Err(error) => PersistOutcome::Failed { path, error },
    })
}

/// Create or replace `path` with `bytes`, mode [`CERT_FILE_MODE`].
pub fn write_certificate(path: &Path, bytes: &[u8]) -> Result<()> {
    let persist_err = |source| Error::Persist {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(CERT_FILE_MODE)
        .open(path)
        .map_err(persist_err)?;
    file.write_all(bytes).map_err(persist_err)?;

    // An existing file keeps its old mode through open(); reset it.
    file.set_permissions(Permissions::from_mode(CERT_FILE_MODE))
        .map_err(persist_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;

    #[test]
    fn writes_next_to_the_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let pub_path = dir.path().join("id_ed25519.pub");

        let outcome = persist(b"ssh-ed25519-cert-v01@openssh.com AAAA\n", &pub_path).unwrap();
        assert!(outcome.is_written());
        assert_eq!(outcome.path(), dir.path().join("id_ed25519-cert.pub"));

        let written = std::fs::read(outcome.path()).unwrap();
        assert_eq!(written, b"ssh-ed25519-cert-v01@openssh.com AAAA\n");
        let mode = std::fs::metadata(outcome.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, CERT_FILE_MODE);
    }

    #[test]
    fn replaces_an_existing_certificate_and_its_mode() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("id_ed25519-cert.pub");
        std::fs::write(&cert_path, "an older and much longer certificate line").unwrap();
        std::fs::set_permissions(&cert_path, Permissions::from_mode(0o600)).unwrap();

        write_certificate(&cert_path, b"new").unwrap();
        assert_eq!(std::fs::read(&cert_path).unwrap(), b"new");
        let mode = std::fs::metadata(&cert_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, CERT_FILE_MODE);
    }

    #[test]
    fn write_failure_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        let pub_path = dir.path().join("missing").join("id_ed25519.pub");

        let outcome = persist(b"cert", &pub_path).unwrap();
        assert!(!outcome.is_written());
        assert_eq!(
            outcome.path(),
            dir.path().join("missing").join("id_ed25519-cert.pub")
        );
        match outcome {
            PersistOutcome::Failed { error, .. } => {
                assert!(error.to_string().starts_with("couldn't write certificate file to"));
            }
            PersistOutcome::Written(_) => unreachable!(),
        }
    }

    #[test]
    fn non_public_key_path_is_an_error() {
        assert!(matches!(
            persist(b"cert", Path::new("/tmp/id_ed25519")),
            Err(Error::KeyPath(_))
        ));
    }
}
