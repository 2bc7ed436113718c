//! An in-memory WebDAV namespace
//!
//! This is mostly useful to mock a server in tests, or to try the mirror and the pruner without any network access.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::DavError;
use crate::mock_behaviour::MockBehaviour;
use crate::node::{decode_path, encode_segment, RemoteNode};
use crate::traits::DavSource;

#[derive(Clone, Debug)]
enum Entry {
    Collection {
        last_modified: Option<String>,
    },
    File {
        content: Vec<u8>,
        last_modified: Option<String>,
        /// What the listing announces as `getcontentlength`. Usually the actual length
        reported_length: u64,
    },
}

#[derive(Default)]
struct State {
    /// Keys are decoded absolute paths, without trailing slash
    entries: BTreeMap<String, Entry>,
    behaviour: MockBehaviour,
    failing_listings: HashSet<String>,
    failing_fetches: HashSet<String>,
    fetch_delay: Option<Duration>,

    list_calls: usize,
    fetch_calls: usize,
    delete_calls: usize,
    uploads: Vec<String>,
}

/// A WebDAV namespace that lives in memory
#[derive(Default)]
pub struct MemoryDav {
    state: Mutex<State>,
}

impl MemoryDav {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection (and its missing parents). `path` is not percent-encoded
    pub fn add_collection(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.insert_parents(&normalize(path));
        state.entries.entry(normalize(path))
            .or_insert(Entry::Collection { last_modified: None });
    }

    /// Add a file (and its missing parent collections). `path` is not percent-encoded
    pub fn add_file(&self, path: &str, content: &[u8], last_modified: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let key = normalize(path);
        state.insert_parents(&key);
        state.entries.insert(key, Entry::File {
            content: content.to_vec(),
            last_modified: last_modified.map(String::from),
            reported_length: content.len() as u64,
        });
    }

    /// Make the listing announce another size than what will actually be sent on download
    pub fn set_reported_length(&self, path: &str, length: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(Entry::File { reported_length, .. }) = state.entries.get_mut(&normalize(path)) {
            *reported_length = length;
        }
    }

    /// Listing this collection will always fail
    pub fn fail_listing_of(&self, path: &str) {
        self.state.lock().unwrap().failing_listings.insert(normalize(path));
    }

    /// Downloading this file will always fail
    pub fn fail_fetch_of(&self, path: &str) {
        self.state.lock().unwrap().failing_fetches.insert(normalize(path));
    }

    /// Every download will wait this long before sending anything
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.state.lock().unwrap().fetch_delay = Some(delay);
    }

    pub fn set_behaviour(&self, behaviour: MockBehaviour) {
        self.state.lock().unwrap().behaviour = behaviour;
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().entries.get(&normalize(path)) {
            Some(Entry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(&normalize(path))
    }

    /// The decoded paths of the direct children of a collection
    pub fn children_of(&self, path: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.children_of(&normalize(path)).map(|(k, _)| k.clone()).collect()
    }

    pub fn list_calls(&self) -> usize { self.state.lock().unwrap().list_calls }
    pub fn fetch_calls(&self) -> usize { self.state.lock().unwrap().fetch_calls }
    pub fn delete_calls(&self) -> usize { self.state.lock().unwrap().delete_calls }
    /// The decoded paths that have been uploaded, in order
    pub fn uploads(&self) -> Vec<String> { self.state.lock().unwrap().uploads.clone() }
}

impl State {
    fn insert_parents(&mut self, key: &str) {
        let mut parent = key;
        while let Some(pos) = parent.rfind('/') {
            parent = &parent[..pos];
            if parent.is_empty() {
                break;
            }
            self.entries.entry(parent.to_string())
                .or_insert(Entry::Collection { last_modified: None });
        }
    }

    fn children_of<'a>(&'a self, key: &str) -> impl Iterator<Item = (&'a String, &'a Entry)> + 'a {
        let prefix = format!("{}/", key);
        let skip = prefix.len();
        self.entries.range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .filter(move |(k, _)| k[skip..].contains('/') == false)
    }
}

#[async_trait]
impl DavSource for MemoryDav {
    async fn list(&self, path: &str) -> Result<Vec<RemoteNode>, DavError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        state.behaviour.can_list(path)?;

        let key = normalize(&decode_path(path)?);
        if state.failing_listings.contains(&key) {
            return Err(DavError::ListingFailed { path: path.to_string(), reason: "expected 207 Multi-Status, got 500 Internal Server Error".to_string() });
        }
        let this = match state.entries.get(&key) {
            None => return Err(DavError::ListingFailed { path: path.to_string(), reason: "expected 207 Multi-Status, got 404 Not Found".to_string() }),
            Some(entry) => entry,
        };

        let mut nodes = vec![to_node(&key, this)];
        if let Entry::Collection { .. } = this {
            nodes.extend(state.children_of(&key).map(|(k, entry)| to_node(k, entry)));
        }
        Ok(nodes)
    }

    async fn fetch(&self, path: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64, DavError> {
        let (content, delay) = {
            let mut state = self.state.lock().unwrap();
            state.fetch_calls += 1;
            state.behaviour.can_fetch(path)?;

            let key = normalize(&decode_path(path)?);
            if state.failing_fetches.contains(&key) {
                return Err(DavError::DownloadFailed { path: path.to_string(), reason: "Unexpected HTTP status code 500".to_string() });
            }
            match state.entries.get(&key) {
                Some(Entry::File { content, .. }) => (content.clone(), state.fetch_delay),
                _ => return Err(DavError::DownloadFailed { path: path.to_string(), reason: "Unexpected HTTP status code 404".to_string() }),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        sink.write_all(&content).await
            .map_err(|err| DavError::DownloadFailed { path: path.to_string(), reason: err.to_string() })?;
        sink.flush().await
            .map_err(|err| DavError::DownloadFailed { path: path.to_string(), reason: err.to_string() })?;
        Ok(content.len() as u64)
    }

    async fn delete(&self, path: &str) -> Result<(), DavError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        state.behaviour.can_delete(path)?;

        let key = normalize(&decode_path(path)?);
        let prefix = format!("{}/", key);
        state.entries.retain(|k, _| k != &key && k.starts_with(&prefix) == false);
        Ok(())
    }

    async fn upload(&self, path: &str, body: Vec<u8>) -> Result<(), DavError> {
        let mut state = self.state.lock().unwrap();
        state.behaviour.can_upload(path)?;

        let key = normalize(&decode_path(path)?);
        let parent = key.rsplitn(2, '/').nth(1).unwrap_or_default();
        match state.entries.get(parent) {
            Some(Entry::Collection { .. }) => {},
            _ => return Err(DavError::UploadFailed { path: path.to_string(), reason: "the target folder does not exist".to_string() }),
        }

        let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        state.uploads.push(key.clone());
        state.entries.insert(key, Entry::File {
            reported_length: body.len() as u64,
            content: body,
            last_modified: Some(now),
        });
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn encode(key: &str) -> String {
    key.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn to_node(key: &str, entry: &Entry) -> RemoteNode {
    match entry {
        Entry::Collection { last_modified } => {
            RemoteNode::new(format!("{}/", encode(key)), true, last_modified.clone(), None)
        },
        Entry::File { last_modified, reported_length, .. } => {
            RemoteNode::new(encode(key), false, last_modified.clone(), Some(*reported_length))
        },
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn listing_is_one_level_deep() {
        let dav = MemoryDav::new();
        dav.add_file("/dav/root/a.txt", b"a", None);
        dav.add_file("/dav/root/sub dir/b.txt", b"b", None);
        dav.add_collection("/dav/root/empty");

        let nodes = dav.list("/dav/root/").await.unwrap();
        let hrefs: Vec<&str> = nodes.iter().map(|n| n.href()).collect();
        assert_eq!(hrefs, vec!["/dav/root/", "/dav/root/a.txt", "/dav/root/empty/", "/dav/root/sub%20dir/"]);
        assert!(nodes[2].is_collection());
        assert_eq!(nodes[1].content_length(), Some(1));

        let sub = dav.list("/dav/root/sub%20dir/").await.unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub[1].name().unwrap(), "b.txt");

        assert!(matches!(dav.list("/dav/nope/").await, Err(DavError::ListingFailed { .. })));
        assert_eq!(dav.list_calls(), 3);
    }

    #[tokio::test]
    async fn delete_and_upload() {
        let dav = MemoryDav::new();
        dav.add_file("/dav/backups/old.zip", b"old", None);

        dav.delete("/dav/backups/old.zip").await.unwrap();
        assert!(dav.contains("/dav/backups/old.zip") == false);
        // Already gone
        dav.delete("/dav/backups/old.zip").await.unwrap();
        assert_eq!(dav.delete_calls(), 2);

        dav.upload("/dav/backups/new%20one.zip", b"new".to_vec()).await.unwrap();
        assert_eq!(dav.file_content("/dav/backups/new one.zip"), Some(b"new".to_vec()));
        assert_eq!(dav.uploads(), vec!["/dav/backups/new one.zip".to_string()]);

        let err = dav.upload("/dav/missing/x.zip", Vec::new()).await.unwrap_err();
        assert!(matches!(err, DavError::UploadFailed { .. }));
    }
}
