//! Signing service HTTP client.
//!
//! Only one endpoint is used: `GET {signer}cert/requests/{id}`, which returns
//! the signed certificate once the request has been approved.  Any other
//! status carries a plain-text reason in the body.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::{Error, Result};

/// Fetches signed certificates by request ID.
pub trait CertFetcher {
    fn fetch(&self, request_id: &str) -> Result<Vec<u8>>;
}

/// Blocking client for one signer endpoint.
///
/// No request timeout is set: a signer that never answers blocks the caller.
#[derive(Debug, Clone)]
pub struct SignerClient {
    http: Client,
    signer_url: String,
}

impl SignerClient {
    pub fn new(signer_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("get-cert/{}", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            http,
            signer_url: signer_url.into(),
        })
    }

    /// URL of the certificate for `request_id`.  The signer URL is used as
    /// configured and is expected to end in `/`.
    pub fn request_url(&self, request_id: &str) -> String {
        format!("{}cert/requests/{request_id}", self.signer_url)
    }
}

impl CertFetcher for SignerClient {
    fn fetch(&self, request_id: &str) -> Result<Vec<u8>> {
        let url = self.request_url(request_id);
        debug!(%url, "fetching certificate");

        let resp = self.http.get(&url).send().map_err(Error::Network)?;
        let status = resp.status();
        let body = resp.bytes().map_err(Error::Network)?;
        debug!(status = status.as_u16(), bytes = body.len(), "signer responded");

        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}
