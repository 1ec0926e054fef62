//! HTTP client for the camera's recording API.
//!
//! The three device operations (query, download, delete) sit behind the
//! [`CameraApi`] trait so the query and transfer logic can be driven by a
//! fake device in tests.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use jennov_common::camera::CameraDescriptor;
use jennov_common::config::Credentials;
use jennov_common::protocol::{self, QueryWindow};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failure talking to a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the offloader needs from a camera.
pub trait CameraApi {
    /// Fetch one page of recordings for `window`; returns the raw XML body.
    fn query(&self, window: &QueryWindow) -> Result<String, DeviceError>;

    /// Stream the recording at `remote_path` into `out`, returning the
    /// number of bytes written.
    fn download(&self, remote_path: &str, out: &mut dyn Write) -> Result<u64, DeviceError>;

    /// Ask the device to delete `remote_path`.  Returns the raw status; the
    /// caller decides what counts as success.
    fn delete(&self, remote_path: &str) -> Result<StatusCode, DeviceError>;
}

/// Everything a request to one camera needs.  Built once per camera and
/// never mutated.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub endpoint: String,
    pub userid: String,
    pub passwd_hash: String,
}

impl ClientContext {
    pub fn new(camera: &CameraDescriptor, credentials: &Credentials) -> Self {
        Self {
            endpoint: camera.endpoint(),
            userid: credentials.userid.clone(),
            passwd_hash: credentials.passwd_hash.clone(),
        }
    }
}

/// Build the blocking HTTP client shared by all cameras of a run.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

    Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .context("Cannot create HTTP client")
}

/// [`CameraApi`] over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpCamera {
    client: Client,
    context: ClientContext,
}

impl HttpCamera {
    pub fn new(client: Client, context: ClientContext) -> Self {
        Self { client, context }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.context.endpoint, path)
    }

    fn post(&self, path: &str, body: String) -> Result<reqwest::blocking::Response, DeviceError> {
        let url = self.url(path);
        debug!("POST {url}");
        Ok(self.client.post(&url).body(body).send()?)
    }
}

impl CameraApi for HttpCamera {
    fn query(&self, window: &QueryWindow) -> Result<String, DeviceError> {
        let body =
            protocol::query_envelope(&self.context.userid, &self.context.passwd_hash, window);
        let resp = self.post(protocol::QUERY_PATH, body)?;

        if !resp.status().is_success() {
            return Err(DeviceError::Status {
                method: "POST",
                url: self.url(protocol::QUERY_PATH),
                status: resp.status(),
            });
        }
        Ok(resp.text()?)
    }

    fn download(&self, remote_path: &str, out: &mut dyn Write) -> Result<u64, DeviceError> {
        let url = self.url(&playback_path(remote_path));
        debug!("GET {url}");
        let mut resp = self.client.get(&url).send()?;

        if !resp.status().is_success() {
            return Err(DeviceError::Status {
                method: "GET",
                url,
                status: resp.status(),
            });
        }

        let written = std::io::copy(&mut resp, &mut *out)?;
        out.flush()?;
        Ok(written)
    }

    fn delete(&self, remote_path: &str) -> Result<StatusCode, DeviceError> {
        let body = protocol::delete_envelope(
            &self.context.userid,
            &self.context.passwd_hash,
            remote_path,
        );
        let resp = self.post(protocol::DELETE_PATH, body)?;
        Ok(resp.status())
    }
}

/// `/playback` + remote path, inserting the separator if the device
/// returned a relative path.
fn playback_path(remote_path: &str) -> String {
    if remote_path.starts_with('/') {
        format!("{}{}", protocol::PLAYBACK_PATH, remote_path)
    } else {
        format!("{}/{}", protocol::PLAYBACK_PATH, remote_path)
    }
}
