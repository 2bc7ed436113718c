//! Traits used by the mirror, the pruner and the backup pipeline to talk to a WebDAV server

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::DavError;
use crate::node::RemoteNode;

/// A hierarchical namespace exposed over WebDAV
///
/// Paths are server-relative and percent-encoded (e.g. `/remote.php/dav/files/anchor/My%20Folder/`), as they appear in listings.
/// This is implemented by the actual [`Client`](crate::client::Client), and by [`MemoryDav`](crate::memory::MemoryDav) that can
/// be used in tests or to mock a server.
#[async_trait]
pub trait DavSource: Sync {
    /// List a collection and its immediate children (`Depth: 1`).
    ///
    /// The collection itself is usually returned as the first entry
    async fn list(&self, path: &str) -> Result<Vec<RemoteNode>, DavError>;

    /// Download the full content of an object into `sink`, and return the number of bytes written
    async fn fetch(&self, path: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64, DavError>;

    /// Remove an object. Removing an object that does not exist is not an error
    async fn delete(&self, path: &str) -> Result<(), DavError>;

    /// Create or replace an object
    async fn upload(&self, path: &str, body: Vec<u8>) -> Result<(), DavError>;
}
