//! Rotation of the backup archives stored in a remote folder

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};

use crate::error::{DavError, PruneError};
use crate::node::RemoteNode;
use crate::traits::DavSource;

/// How archives are recognized, and how the pruning is run
#[derive(Clone, Debug)]
pub struct PruneSettings {
    /// Only files whose name contains this are considered as archives
    pub marker: String,
    /// ...and whose name ends with this
    pub extension: String,
    /// Maximum number of deletions in flight
    pub workers: usize,
    pub timeout: Option<Duration>,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            marker: "collectives_backup_".to_string(),
            extension: ".zip".to_string(),
            workers: 4,
            timeout: None,
        }
    }
}

/// An archive that may be deleted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveCandidate {
    pub href: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    /// How many archives have actually been deleted
    pub deleted: usize,
    /// The deletions that failed
    pub failed: Vec<DavError>,
    /// Set in case the folder could not be listed (in which case nothing has been pruned)
    pub listing_error: Option<DavError>,
}


/// Delete every archive of `remote_dir` but the `keep` most recent ones.
///
/// Nothing happens when `keep` is `None`. This never fails because of the server: a folder that cannot be listed
/// is considered as having nothing to prune, and a failed deletion does not prevent the other ones.
pub async fn prune<S>(source: &S, remote_dir: &str, keep: Option<usize>, settings: &PruneSettings) -> Result<PruneReport, PruneError>
where
    S: DavSource + ?Sized,
{
    let keep = match keep {
        None => {
            log::debug!("No retention count set, not pruning {}", remote_dir);
            return Ok(PruneReport::default());
        },
        Some(keep) => keep,
    };

    match settings.timeout {
        None => Ok(prune_inner(source, remote_dir, keep, settings).await),
        Some(limit) => tokio::time::timeout(limit, prune_inner(source, remote_dir, keep, settings))
            .await
            .map_err(|_| PruneError::TimedOut(limit)),
    }
}

async fn prune_inner<S>(source: &S, remote_dir: &str, keep: usize, settings: &PruneSettings) -> PruneReport
where
    S: DavSource + ?Sized,
{
    let mut report = PruneReport::default();

    let nodes = match source.list(remote_dir).await {
        Ok(nodes) => nodes,
        Err(err) => {
            log::warn!("Unable to list old backups, not pruning anything: {}", err);
            report.listing_error = Some(err);
            return report;
        },
    };

    let to_delete = select_for_deletion(&nodes, keep, settings);
    if to_delete.is_empty() {
        log::info!("No backup to prune in {}", remote_dir);
        return report;
    }

    let results: Vec<Result<(), DavError>> = stream::iter(to_delete)
        .map(|candidate| async move {
            log::info!("Deleting old backup: {} (last modified {})", candidate.href, candidate.last_modified);
            source.delete(&candidate.href).await
        })
        .buffer_unordered(settings.workers.max(1))
        .collect()
        .await;

    for result in results {
        match result {
            Ok(()) => report.deleted += 1,
            Err(err) => {
                log::warn!("Unable to delete old backup: {}", err);
                report.failed.push(err);
            },
        }
    }
    report
}

/// Among the entries of a listing, return the archives that should be deleted to keep only the `keep` most recent ones,
/// oldest first
pub fn select_for_deletion(nodes: &[RemoteNode], keep: usize, settings: &PruneSettings) -> Vec<ArchiveCandidate> {
    let mut candidates: Vec<ArchiveCandidate> = nodes.iter()
        .filter(|node| node.is_collection() == false)
        .filter(|node| match node.name() {
            Ok(name) => name.contains(&settings.marker) && name.ends_with(&settings.extension),
            Err(_) => false,
        })
        .filter_map(|node| match node.last_modified_at() {
            Some(last_modified) => Some(ArchiveCandidate { href: node.href().to_string(), last_modified }),
            None => {
                log::warn!("Ignoring {}, its last modification date is unknown ({:?})", node.href(), node.last_modified());
                None
            },
        })
        .collect();

    // Stable, so that equal dates keep the listing order
    candidates.sort_by_key(|c| c.last_modified);

    let excess = candidates.len().saturating_sub(keep);
    candidates.truncate(excess);
    candidates
}
