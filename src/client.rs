//! This module provides a client to connect to a WebDAV server

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::error::DavError;
use crate::multistatus::{self, LISTING_BODY};
use crate::node::RemoteNode;
use crate::resource::Resource;
use crate::traits::DavSource;

/// How long a single request (including its body transfer) may last
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);


/// A WebDAV source that fetches its data from a WebDAV server
pub struct Client {
    resource: Resource,
    http: reqwest::Client,
}

impl Client {
    /// Create a client. This does not start a connection
    pub fn new<S: AsRef<str>, T: ToString, U: ToString>(url: S, username: T, password: U) -> Result<Self, DavError> {
        let url = Url::parse(url.as_ref())
            .map_err(|err| DavError::decode(format!("invalid server URL {}: {}", url.as_ref(), err)))?;
        Self::from_resource(Resource::new(url, username.to_string(), password.to_string()))
    }

    pub fn from_resource(resource: Resource) -> Result<Self, DavError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { resource, http })
    }

    pub fn resource(&self) -> &Resource { &self.resource }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let target = self.resource.combine(path);
        self.http
            .request(method, target.url().as_str())
            .basic_auth(self.resource.username(), Some(self.resource.password()))
    }
}

#[async_trait]
impl DavSource for Client {
    async fn list(&self, path: &str) -> Result<Vec<RemoteNode>, DavError> {
        let listing_failed = |reason: String| DavError::ListingFailed { path: path.to_string(), reason };

        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|err| listing_failed(err.to_string()))?;

        log::debug!("PROPFIND {}", path);
        let res = self.request(method, path)
            .header("Depth", 1)
            .header(CONTENT_TYPE, "application/xml")
            .body(LISTING_BODY)
            .send()
            .await
            .map_err(|err| listing_failed(err.to_string()))?;

        if res.status() != StatusCode::MULTI_STATUS {
            return Err(listing_failed(format!("expected 207 Multi-Status, got {}", res.status())));
        }

        let text = res.text().await.map_err(|err| listing_failed(err.to_string()))?;
        multistatus::parse(&text)
    }

    async fn fetch(&self, path: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64, DavError> {
        log::debug!("GET {}", path);
        let download_failed = |reason: String| DavError::DownloadFailed { path: path.to_string(), reason };

        let mut res = self.request(Method::GET, path)
            .send()
            .await
            .map_err(|err| download_failed(err.to_string()))?;

        if res.status().is_success() == false {
            return Err(download_failed(format!("Unexpected HTTP status code {:?}", res.status())));
        }
        let announced = res.content_length();

        let mut written: u64 = 0;
        while let Some(chunk) = res.chunk().await.map_err(|err| download_failed(err.to_string()))? {
            sink.write_all(&chunk).await.map_err(|err| download_failed(err.to_string()))?;
            written += chunk.len() as u64;
        }
        sink.flush().await.map_err(|err| download_failed(err.to_string()))?;

        if let Some(expected) = announced {
            if expected != written {
                return Err(download_failed(format!("received {} bytes out of {}", written, expected)));
            }
        }
        Ok(written)
    }

    async fn delete(&self, path: &str) -> Result<(), DavError> {
        log::debug!("DELETE {}", path);
        let res = self.request(Method::DELETE, path)
            .send()
            .await
            .map_err(|err| DavError::DeleteFailed { path: path.to_string(), reason: err.to_string() })?;

        if res.status() == StatusCode::NOT_FOUND {
            log::debug!("{} was already deleted", path);
            return Ok(());
        }
        if res.status().is_success() == false {
            return Err(DavError::DeleteFailed {
                path: path.to_string(),
                reason: format!("Unexpected HTTP status code {:?}", res.status()),
            });
        }
        Ok(())
    }

    async fn upload(&self, path: &str, body: Vec<u8>) -> Result<(), DavError> {
        log::debug!("PUT {} ({} bytes)", path, body.len());
        let res = self.request(Method::PUT, path)
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await
            .map_err(|err| DavError::UploadFailed { path: path.to_string(), reason: err.to_string() })?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(DavError::UploadFailed {
                path: path.to_string(),
                reason: "the target folder does not exist".to_string(),
            }),
            status if status.is_success() => Ok(()),
            status => Err(DavError::UploadFailed {
                path: path.to_string(),
                reason: format!("Unexpected HTTP status code {:?}", status),
            }),
        }
    }
}
