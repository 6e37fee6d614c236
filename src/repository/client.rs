use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::multipart;
use serde::Deserialize;

use crate::error::Error;

/// How much of a failed response body is kept for diagnostics
const ERROR_BODY_LIMIT: u64 = 4 * 1024;

/// Successful upload response shape
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Failed upload response shape
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: String,
}

/// Client for the package repository service.
///
/// Constructed once with its base URL and timeout, both immutable
/// afterwards, and passed by reference to whichever command issues requests.
/// Each transfer is a single best-effort attempt; there is no retry loop.
pub struct RepositoryClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl RepositoryClient {
    /// Create a new repository client. `timeout` bounds the whole HTTP
    /// round-trip including body reads.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(RepositoryClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Download a package archive. Returns the live response body as a
    /// reader; the caller consumes it (usually straight into the extractor)
    /// and drops it exactly once.
    pub fn download(&self, package_name: &str) -> Result<reqwest::blocking::Response> {
        let url = format!("{}/packages/{}/download", self.base_url, package_name);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .map_err(Error::Network)
            .with_context(|| format!("Failed to download package {}", package_name))?;

        let status = response.status();
        if !status.is_success() {
            let body = bounded_body_excerpt(response);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            })
            .with_context(|| format!("Failed to download package {}", package_name));
        }
        tracing::debug!("download status {} for {}", status, package_name);

        Ok(response)
    }

    /// Upload a package archive, authorized by `token`. Returns the URL the
    /// repository assigned to the uploaded package.
    pub fn upload(&self, package_name: &str, archive: Vec<u8>, token: &str) -> Result<String> {
        let url = format!("{}/packages/upload", self.base_url);
        tracing::debug!("POST {} ({} bytes)", url, archive.len());

        let part = multipart::Part::bytes(archive)
            .file_name(format!("{}.tar.gz", package_name))
            .mime_str("application/gzip")
            .context("Failed to build multipart payload")?;
        let form = multipart::Form::new().part("archive", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .map_err(Error::Network)
            .with_context(|| format!("Failed to upload package {}", package_name))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(Error::Network)
            .with_context(|| format!("Failed to read upload response for {}", package_name))?;

        if status.is_success() {
            let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
                Error::Protocol(format!("unexpected upload response body: {}", e))
            })?;
            tracing::info!("uploaded {} to {}", package_name, parsed.url);
            Ok(parsed.url)
        } else {
            let parsed: ErrorResponse = serde_json::from_str(&body).map_err(|e| {
                Error::Protocol(format!(
                    "unexpected error response body for status {}: {}",
                    status, e
                ))
            })?;
            Err(Error::HttpStatus {
                status: status.as_u16(),
                body: parsed.detail,
            })
            .with_context(|| format!("Failed to upload package {}", package_name))
        }
    }
}

/// Read at most [`ERROR_BODY_LIMIT`] bytes of a failed response body for the
/// error message; the rest of the stream is not consumed.
fn bounded_body_excerpt(response: reqwest::blocking::Response) -> String {
    let mut buf = Vec::new();
    let mut limited = response.take(ERROR_BODY_LIMIT);
    if let Err(e) = limited.read_to_end(&mut buf) {
        tracing::debug!("failed to read error response body: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
