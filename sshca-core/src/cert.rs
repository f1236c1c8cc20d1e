//! Certificate decoding.
//!
//! The signer returns certificates as a single `authorized_keys` style line:
//!
//! ```text
//! ssh-ed25519-cert-v01@openssh.com AAAA... comment
//! ```
//!
//! [`parse_authorized_key`] decodes such a line into a [`ParsedKey`], which
//! is either a certificate or a bare public key.  Only the certificate
//! variant carries a validity window, so callers that need one go through
//! [`ParsedKey::into_certificate`] and get a typed error otherwise.

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use ssh_key::{Certificate, HashAlg, PublicKey};

use crate::error::{Error, Result};

/// Algorithm names of OpenSSH certificates all end with this.
const CERT_ALGORITHM_SUFFIX: &str = "-cert-v01@openssh.com";

/// Longest lifetime handed to the agent.  `ssh-add -t` rejects anything
/// that does not fit a C `int`, which a certificate issued for a century
/// easily exceeds.
pub const MAX_TTL_SECS: u64 = i32::MAX as u64;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("no key found")]
    Empty,

    #[error("{0}")]
    Key(#[from] ssh_key::Error),

    /// OpenSSH writes "valid forever" as `u64::MAX`, which does not fit the
    /// signed timestamps certificates are decoded into.
    #[error("certificate has no expiry; only certificates with a validity limit can be installed")]
    UnboundedValidity,

    #[error("got a bare {algorithm} public key, not a certificate")]
    NotACertificate { algorithm: String },
}

/// A decoded `authorized_keys` record.
#[derive(Debug, Clone)]
pub enum ParsedKey {
    Certificate(Box<Certificate>),
    PublicKey(PublicKey),
}

impl ParsedKey {
    pub fn into_certificate(self) -> Result<Certificate, ParseError> {
        match self {
            Self::Certificate(cert) => Ok(*cert),
            Self::PublicKey(key) => Err(ParseError::NotACertificate {
                algorithm: key.algorithm().as_str().to_string(),
            }),
        }
    }
}

/// Decode the first record in `raw`.
///
/// Blank lines and `#` comments before the record are skipped; anything after
/// the first record is ignored.
pub fn parse_authorized_key(raw: &[u8]) -> Result<ParsedKey, ParseError> {
    let text = std::str::from_utf8(raw)?;
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .ok_or(ParseError::Empty)?;

    let algorithm = line.split_whitespace().next().unwrap_or_default();
    if algorithm.ends_with(CERT_ALGORITHM_SUFFIX) {
        let cert = Certificate::from_openssh(line).map_err(|e| match e {
            ssh_key::Error::Time => ParseError::UnboundedValidity,
            e => ParseError::Key(e),
        })?;
        Ok(ParsedKey::Certificate(Box::new(cert)))
    } else {
        Ok(ParsedKey::PublicKey(PublicKey::from_openssh(line)?))
    }
}

/// Decode `raw` and insist on a certificate.
pub fn parse_certificate(raw: &[u8]) -> Result<Certificate> {
    Ok(parse_authorized_key(raw)?.into_certificate()?)
}

/// Whole seconds between `now` and the certificate's valid-before time.
///
/// Fails with [`Error::Expired`] when less than one second remains.  The
/// result is clamped to [`MAX_TTL_SECS`].
pub fn remaining_ttl(cert: &Certificate, now: SystemTime) -> Result<u64> {
    let valid_before = cert.valid_before();
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let remaining = i128::from(valid_before) - i128::from(now_secs);
    if remaining < 1 {
        return Err(Error::Expired { valid_before });
    }
    Ok(u64::try_from(remaining).map_or(MAX_TTL_SECS, |r| r.min(MAX_TTL_SECS)))
}

/// Human-readable summary of `cert`, printed before installation so the user
/// can see what they are about to load.
pub fn describe(cert: &Certificate) -> String {
    let mut out = String::from("Certificate data:\n");
    let kind = if cert.cert_type().is_host() { "host" } else { "user" };

    // Writing into a String cannot fail.
    let _ = writeln!(out, "  Type: {} {kind} certificate", cert.algorithm().as_str());
    let _ = writeln!(out, "  Serial: {}", cert.serial());
    let _ = writeln!(out, "  Key id: {}", cert.key_id());
    let _ = writeln!(out, "  Principals: {}", join_or_none(cert.valid_principals()));
    let _ = writeln!(
        out,
        "  Critical options: {}",
        join_options(cert.critical_options().iter())
    );
    let _ = writeln!(out, "  Extensions: {}", join_options(cert.extensions().iter()));
    let _ = writeln!(
        out,
        "  Valid for public key: {}",
        cert.public_key().fingerprint(HashAlg::Sha256)
    );
    let _ = writeln!(
        out,
        "  Signed by CA: {}",
        cert.signature_key().fingerprint(HashAlg::Sha256)
    );
    let _ = write!(
        out,
        "  Valid from {} to {}",
        format_timestamp(cert.valid_after()),
        format_timestamp(cert.valid_before())
    );
    out
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn join_options<'a>(options: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    let rendered: Vec<String> = options
        .map(|(name, value)| {
            if value.is_empty() {
                name.clone()
            } else {
                format!("{name}={value}")
            }
        })
        .collect();
    join_or_none(&rendered)
}

fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mint_certificate, now_secs, with_valid_before};
    use std::time::Duration;

    #[test]
    fn parses_certificate_line() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 3600);
        let line = minted.certificate.to_openssh().unwrap();

        let cert = parse_certificate(line.as_bytes()).unwrap();
        assert_eq!(cert.key_id(), "alice@laptop");
        assert_eq!(cert.public_key(), minted.user_key.public_key().key_data());
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 3600);
        let text = format!(
            "\n# issued by the signer\n{}\n",
            minted.certificate.to_openssh().unwrap()
        );
        assert!(parse_certificate(text.as_bytes()).is_ok());
    }

    #[test]
    fn bare_public_key_is_a_typed_mismatch() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 3600);
        let line = minted.user_key.public_key().to_openssh().unwrap();

        let parsed = parse_authorized_key(line.as_bytes()).unwrap();
        assert!(matches!(parsed, ParsedKey::PublicKey(_)));

        let err = parse_certificate(line.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ParseError::NotACertificate { ref algorithm }) if algorithm == "ssh-ed25519"
        ));
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let cases: [&[u8]; 5] = [
            b"",
            b"\n\n# only a comment\n",
            b"ssh-ed25519-cert-v01@openssh.com AAAAnotbase64!!",
            b"ssh-ed25519 AAAAC3NzaC1lZDI1NTE5",
            b"\xff\xfe",
        ];
        for raw in cases {
            assert!(
                matches!(parse_certificate(raw), Err(Error::Parse(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn ttl_counts_whole_seconds_until_expiry() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 3600);
        let ttl = remaining_ttl(&minted.certificate, SystemTime::now()).unwrap();
        assert!((3599..=3600).contains(&ttl), "ttl = {ttl}");
    }

    #[test]
    fn ttl_is_exact_for_a_fixed_clock() {
        let minted = mint_certificate(1_000, 5_000);
        let now = UNIX_EPOCH + Duration::from_secs(4_999);
        assert_eq!(remaining_ttl(&minted.certificate, now).unwrap(), 1);
    }

    #[test]
    fn expired_or_expiring_now_is_rejected() {
        let minted = mint_certificate(now_secs() - 7200, now_secs() - 1);
        assert!(matches!(
            remaining_ttl(&minted.certificate, SystemTime::now()),
            Err(Error::Expired { .. })
        ));

        let minted = mint_certificate(1_000, 5_000);
        let now = UNIX_EPOCH + Duration::from_secs(5_000);
        assert!(matches!(
            remaining_ttl(&minted.certificate, now),
            Err(Error::Expired { valid_before: 5_000 })
        ));
    }

    #[test]
    fn century_long_certificate_is_clamped() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 100 * 365 * 86_400);
        let ttl = remaining_ttl(&minted.certificate, SystemTime::now()).unwrap();
        assert_eq!(ttl, MAX_TTL_SECS);
    }

    #[test]
    fn certificate_valid_forever_is_rejected() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 3600);
        let line = with_valid_before(&minted.certificate, u64::MAX);

        let err = parse_certificate(line.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::UnboundedValidity)));
        assert!(err.to_string().contains("no expiry"));
    }

    #[test]
    fn last_representable_expiry_still_parses() {
        let minted = mint_certificate(now_secs() - 60, now_secs() + 3600);
        let line = with_valid_before(&minted.certificate, i64::MAX as u64);

        let cert = parse_certificate(line.as_bytes()).unwrap();
        assert_eq!(cert.valid_before(), i64::MAX as u64);
        assert_eq!(remaining_ttl(&cert, SystemTime::now()).unwrap(), MAX_TTL_SECS);
        assert!(describe(&cert).contains(&i64::MAX.to_string()));
    }

    #[test]
    fn describe_lists_signed_fields() {
        let minted = mint_certificate(0, 86_400);
        let text = describe(&minted.certificate);
        assert!(text.contains("Key id: alice@laptop"));
        assert!(text.contains("Principals: alice"));
        assert!(text.contains("Extensions: permit-pty"));
        assert!(text.contains("Critical options: (none)"));
        assert!(text.contains("user certificate"));
        assert!(text.contains("Valid from 1970-01-01 00:00:00 UTC to 1970-01-02 00:00:00 UTC"));
    }
}
