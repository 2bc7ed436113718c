//! Reproduce a remote WebDAV tree into a local directory
//!
//! The remote tree is walked breadth-first from an explicit work queue, one `Depth: 1` listing per collection.
//! Several collections and downloads are handled at the same time, but never more than [`MirrorSettings::workers`]
//! requests are in flight.
//!
//! Downloads are first written to a hidden temporary file next to their destination, and only moved to their final
//! path once complete. That way, a file that exists in the mirror always has the full content of its remote counterpart.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures_util::stream::{self, FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{DavError, MirrorError};
use crate::node::RemoteNode;
use crate::traits::DavSource;

/// How the mirror is run
#[derive(Clone, Debug)]
pub struct MirrorSettings {
    /// Maximum number of requests in flight
    pub workers: usize,
    /// Collections deeper than this (the remote root being at depth 0) are not mirrored
    pub max_depth: usize,
    /// The whole mirror is interrupted after this duration
    pub timeout: Option<Duration>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_depth: 64,
            timeout: None,
        }
    }
}

/// What ended up on the disk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}


/// Mirror the remote collection `remote_root` (a percent-encoded, server-relative path) into `local_root`.
///
/// `local_root` is created if needed. Existing local files are overwritten, but nothing is ever deleted, so that
/// running this twice over an unchanged remote tree leaves the local tree unchanged.
///
/// A failure only aborts the subtree (or the file) it happened on. Every failure is reported in the returned [`MirrorError`].
pub async fn mirror<S>(source: &S, remote_root: &str, local_root: &Path, settings: &MirrorSettings) -> Result<MirrorStats, MirrorError>
where
    S: DavSource + ?Sized,
{
    let run = MirrorRun {
        source,
        settings,
        permits: Semaphore::new(settings.workers.max(1)),
        shared: Mutex::new(Shared::default()),
    };
    log::info!("Mirroring {} into {:?}", remote_root, local_root);

    let completed = match settings.timeout {
        None => {
            run.walk(remote_root, local_root).await;
            true
        },
        Some(limit) => tokio::time::timeout(limit, run.walk(remote_root, local_root)).await.is_ok(),
    };

    if completed == false {
        // The walk has been dropped mid-flight. Whatever it was downloading is incomplete
        let discarded_partials = run.discard_partials();
        let Shared { stats, failures, .. } = run.into_shared();
        log::warn!("Mirror of {} timed out, {} incomplete downloads discarded", remote_root, discarded_partials.len());
        return Err(MirrorError { failures, stats, timed_out: true, discarded_partials });
    }

    let Shared { stats, failures, .. } = run.into_shared();
    if failures.is_empty() {
        log::info!("Mirrored {} directories and {} files ({} bytes)", stats.directories, stats.files, stats.bytes);
        Ok(stats)
    } else {
        Err(MirrorError { failures, stats, timed_out: false, discarded_partials: Vec::new() })
    }
}


/// A collection that is yet to be mirrored
struct PendingDir {
    href: String,
    local: PathBuf,
    depth: usize,
}

/// What a run has done so far. It survives the walk being dropped on timeout
#[derive(Default)]
struct Shared {
    stats: MirrorStats,
    failures: Vec<DavError>,
    /// Temporary files that are currently being written
    in_flight: HashSet<PathBuf>,
}

struct MirrorRun<'a, S: ?Sized> {
    source: &'a S,
    settings: &'a MirrorSettings,
    permits: Semaphore,
    shared: Mutex<Shared>,
}

impl<'a, S> MirrorRun<'a, S>
where
    S: DavSource + ?Sized,
{
    /// A panic while the lock is held cannot leave `Shared` half-updated, so a poisoned lock is still usable
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn into_shared(self) -> Shared {
        self.shared.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn walk(&self, remote_root: &str, local_root: &Path) {
        let mut queue = VecDeque::new();
        queue.push_back(PendingDir { href: remote_root.to_string(), local: local_root.to_path_buf(), depth: 0 });
        let mut running = FuturesUnordered::new();

        loop {
            while running.len() < self.settings.workers.max(1) {
                match queue.pop_front() {
                    Some(dir) => running.push(self.visit(dir)),
                    None => break,
                }
            }

            match running.next().await {
                None => break,
                Some(Err(err)) => {
                    log::warn!("{}", err);
                    self.shared().failures.push(err);
                },
                Some(Ok(subdirs)) => queue.extend(subdirs),
            }
        }
    }

    /// Mirror the direct content of a collection, and return its sub-collections.
    /// An `Err` means the whole collection could not be mirrored
    async fn visit(&self, dir: PendingDir) -> Result<Vec<PendingDir>, DavError> {
        if dir.depth > self.settings.max_depth {
            return Err(DavError::DepthExceeded { path: dir.href, max_depth: self.settings.max_depth });
        }

        tokio::fs::create_dir_all(&dir.local).await
            .map_err(|err| DavError::io(&dir.local, err))?;

        let nodes = {
            let _permit = self.permits.acquire().await;
            self.source.list(&dir.href).await?
        };
        log::debug!("{} has {} entries", dir.href, nodes.len());

        self.shared().stats.directories += 1;
        let mut subdirs = Vec::new();

        let mut names = HashSet::new();
        let mut downloads = Vec::new();
        for node in nodes {
            // The listing contains the collection itself
            match node.is_same_path_as(&dir.href) {
                Ok(true) => continue,
                Ok(false) => {},
                Err(err) => {
                    self.shared().failures.push(err);
                    continue;
                },
            }

            let local = match local_name(&node) {
                Ok(name) => dir.local.join(name),
                Err(err) => {
                    log::warn!("{}", err);
                    self.shared().failures.push(err);
                    continue;
                },
            };
            if names.insert(local.clone()) == false {
                let err = DavError::decode(format!("{} maps to {:?}, which is already used by another entry", node.href(), local));
                log::warn!("{}", err);
                self.shared().failures.push(err);
                continue;
            }

            if node.is_collection() {
                subdirs.push(PendingDir { href: node.href().to_string(), local, depth: dir.depth + 1 });
            } else {
                downloads.push((node, local));
            }
        }

        stream::iter(downloads)
            .map(|(node, local)| async move { self.download(&node, &local).await })
            .buffer_unordered(self.settings.workers.max(1))
            .for_each(|result| async move {
                let mut shared = self.shared();
                match result {
                    Ok(bytes) => {
                        shared.stats.files += 1;
                        shared.stats.bytes += bytes;
                    },
                    Err(err) => {
                        log::warn!("{}", err);
                        shared.failures.push(err);
                    },
                }
            })
            .await;

        Ok(subdirs)
    }

    /// Download a remote object to `local`, replacing any existing file
    async fn download(&self, node: &RemoteNode, local: &Path) -> Result<u64, DavError> {
        let download_failed = |reason: String| DavError::DownloadFailed { path: node.href().to_string(), reason };

        let partial = partial_path(local);
        self.shared().in_flight.insert(partial.clone());
        let result = self.download_to(node, &partial).await;

        let result = match result {
            Ok(written) => tokio::fs::rename(&partial, local).await
                .map(|_| written)
                .map_err(|err| download_failed(format!("unable to move {:?} to its final location: {}", partial, err))),
            Err(err) => Err(err),
        };

        if result.is_err() {
            if let Err(err) = tokio::fs::remove_file(&partial).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Unable to remove incomplete download {:?}: {}", partial, err);
                }
            }
        }
        self.shared().in_flight.remove(&partial);

        if result.is_ok() {
            log::debug!("Downloaded {} to {:?}", node.href(), local);
        }
        result
    }

    async fn download_to(&self, node: &RemoteNode, partial: &Path) -> Result<u64, DavError> {
        let download_failed = |reason: String| DavError::DownloadFailed { path: node.href().to_string(), reason };

        let mut file = tokio::fs::File::create(partial).await
            .map_err(|err| download_failed(format!("unable to create {:?}: {}", partial, err)))?;

        let written = {
            let _permit = self.permits.acquire().await;
            match self.source.fetch(node.href(), &mut file).await {
                Ok(written) => written,
                Err(DavError::DownloadFailed { reason, .. }) => return Err(download_failed(reason)),
                Err(err) => return Err(download_failed(err.to_string())),
            }
        };
        file.sync_all().await
            .map_err(|err| download_failed(format!("unable to write {:?}: {}", partial, err)))?;

        if let Some(expected) = node.content_length() {
            if expected != written {
                return Err(download_failed(format!("incomplete content: received {} bytes out of {}", written, expected)));
            }
        }
        Ok(written)
    }

    /// Remove the temporary files of the downloads that were in progress
    fn discard_partials(&self) -> Vec<PathBuf> {
        let partials: Vec<PathBuf> = self.shared().in_flight.drain().collect();
        for partial in &partials {
            if let Err(err) = std::fs::remove_file(partial) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Unable to remove incomplete download {:?}: {}", partial, err);
                }
            }
        }
        partials
    }
}


/// The name a node gets in the local mirror. This is its decoded remote name, unless the platform forbids it
fn local_name(node: &RemoteNode) -> Result<String, DavError> {
    let name = node.name()?;
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(DavError::decode(format!("{} has no usable local name", node.href())));
    }
    platform_name(node, name)
}

#[cfg(not(windows))]
fn platform_name(_node: &RemoteNode, name: String) -> Result<String, DavError> {
    Ok(name)
}

#[cfg(windows)]
fn platform_name(node: &RemoteNode, name: String) -> Result<String, DavError> {
    let sanitized = sanitize_filename::sanitize(&name);
    if sanitized.is_empty() {
        return Err(DavError::decode(format!("{} has no usable local name", node.href())));
    }
    if sanitized != name {
        log::info!("{:?} will be stored locally as {:?}", name, sanitized);
    }
    Ok(sanitized)
}

/// Where a file is downloaded before being complete
fn partial_path(local: &Path) -> PathBuf {
    let name = local.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    local.with_file_name(format!(".{}.{}.partial", name, Uuid::new_v4()))
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_names() {
        let node = RemoteNode::new("/dav/root/report%20%28final%29.txt".to_string(), false, None, None);
        assert_eq!(local_name(&node).unwrap(), "report (final).txt");

        let parent = RemoteNode::new("/dav/root/..".to_string(), true, None, None);
        assert!(local_name(&parent).is_err());

        let slash = RemoteNode::new("/dav/root/a%2Fb.txt".to_string(), false, None, None);
        assert!(matches!(local_name(&slash), Err(DavError::DecodeFailed { .. })));

        let nul = RemoteNode::new("/dav/root/a%00b.txt".to_string(), false, None, None);
        assert!(local_name(&nul).is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn local_names_are_kept_verbatim() {
        let node = RemoteNode::new("/dav/root/Meeting%3A%20notes%3F.md".to_string(), false, None, None);
        assert_eq!(local_name(&node).unwrap(), "Meeting: notes?.md");

        let node = RemoteNode::new("/dav/root/Q%26A%20%3Cdraft%3E%20%7C%20%22v2%22%20*.md".to_string(), false, None, None);
        assert_eq!(local_name(&node).unwrap(), "Q&A <draft> | \"v2\" *.md");
    }

    #[test]
    fn partial_paths_are_hidden_siblings() {
        let partial = partial_path(Path::new("/tmp/mirror/notes.md"));
        assert_eq!(partial.parent(), Some(Path::new("/tmp/mirror")));
        let name = partial.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".notes.md."));
        assert!(name.ends_with(".partial"));
    }
}
