//! Fixtures for tests in this and downstream crates.
//!
//! Enabled for this crate's own tests and, elsewhere, through the `testing`
//! feature.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::{BASE64_STANDARD, Engine};
use ssh_key::certificate::{Builder, CertType};
use ssh_key::rand_core::OsRng;
use ssh_key::{Algorithm, Certificate, PrivateKey};

/// A freshly generated user key and a certificate for it.
pub struct MintedCert {
    pub user_key: PrivateKey,
    pub ca_key: PrivateKey,
    pub certificate: Certificate,
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn random_ed25519() -> PrivateKey {
    PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap()
}

/// Sign a user certificate for a new ed25519 key.
pub fn mint_certificate(valid_after: u64, valid_before: u64) -> MintedCert {
    let user_key = random_ed25519();
    let ca_key = random_ed25519();
    let certificate = certify(&user_key, &ca_key, valid_after, valid_before);
    MintedCert {
        user_key,
        ca_key,
        certificate,
    }
}

/// Sign a user certificate for `user_key` with `ca_key`.
pub fn certify(
    user_key: &PrivateKey,
    ca_key: &PrivateKey,
    valid_after: u64,
    valid_before: u64,
) -> Certificate {
    let mut builder =
        Builder::new_with_random_nonce(&mut OsRng, user_key.public_key(), valid_after, valid_before)
            .unwrap();
    builder.serial(7).unwrap();
    builder.key_id("alice@laptop").unwrap();
    builder.cert_type(CertType::User).unwrap();
    builder.valid_principal("alice").unwrap();
    builder.extension("permit-pty", "").unwrap();
    builder.comment("alice@laptop").unwrap();
    builder.sign(ca_key).unwrap()
}

/// `cert` as an `authorized_keys` line with its valid-before field replaced
/// by `valid_before`.
///
/// Works on the wire encoding, so it can produce timestamps the certificate
/// builder refuses, such as OpenSSH's `u64::MAX` for "forever".  The
/// signature no longer verifies.
pub fn with_valid_before(cert: &Certificate, valid_before: u64) -> String {
    let mut blob = cert.to_bytes().unwrap();
    let mut window = cert.valid_after().to_be_bytes().to_vec();
    window.extend_from_slice(&cert.valid_before().to_be_bytes());
    let at = blob
        .windows(window.len())
        .position(|w| w == window.as_slice())
        .unwrap()
        + 8;
    blob[at..at + 8].copy_from_slice(&valid_before.to_be_bytes());
    format!("{} {}", cert.algorithm().to_certificate_type(), BASE64_STANDARD.encode(blob))
}
