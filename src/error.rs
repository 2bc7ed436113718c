//! Error types returned by the remote source, the mirror and the pruner

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::mirror::MirrorStats;

/// An error that happens while talking to a WebDAV source, or while handling what it returned
#[derive(Debug, Error)]
pub enum DavError {
    /// A PROPFIND did not come back as a `207 Multi-Status`
    #[error("unable to list {path}: {reason}")]
    ListingFailed { path: String, reason: String },

    /// A GET failed, or did not deliver the whole object
    #[error("unable to download {path}: {reason}")]
    DownloadFailed { path: String, reason: String },

    #[error("unable to delete {path}: {reason}")]
    DeleteFailed { path: String, reason: String },

    #[error("unable to upload {path}: {reason}")]
    UploadFailed { path: String, reason: String },

    /// A listing (or one of its entries) could not be understood
    #[error("unable to decode listing: {detail}")]
    DecodeFailed { detail: String },

    #[error("{path} is deeper than the allowed {max_depth} levels")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DavError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn decode(detail: impl Display) -> Self {
        Self::DecodeFailed { detail: detail.to_string() }
    }
}


/// Everything that went wrong during a [`mirror`](crate::mirror::mirror) run
///
/// Failures of a subtree do not prevent its siblings from being mirrored, so this carries the stats of what
/// actually made it to the disk as well.
#[derive(Debug)]
pub struct MirrorError {
    pub failures: Vec<DavError>,
    pub stats: MirrorStats,
    /// Whether the run was interrupted because it exceeded its timeout
    pub timed_out: bool,
    /// Temporary files of downloads that were in progress when the run was interrupted. They have been removed.
    pub discarded_partials: Vec<PathBuf>,
}

impl Display for MirrorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.timed_out {
            write!(f, "mirror timed out ({} incomplete downloads discarded)", self.discarded_partials.len())?;
            if self.failures.is_empty() {
                return Ok(());
            }
            write!(f, ", ")?;
        }
        write!(f, "{} failure(s) while mirroring", self.failures.len())?;
        if let Some(first) = self.failures.first() {
            write!(f, ", first one: {}", first)?;
        }
        Ok(())
    }
}

impl std::error::Error for MirrorError {}


#[derive(Debug, Error)]
pub enum PruneError {
    #[error("pruning did not complete within {0:?}")]
    TimedOut(Duration),
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mirror_error_display() {
        let err = MirrorError {
            failures: vec![DavError::ListingFailed { path: "/a/".to_string(), reason: "HTTP 403".to_string() }],
            stats: MirrorStats::default(),
            timed_out: false,
            discarded_partials: Vec::new(),
        };
        assert_eq!(err.to_string(), "1 failure(s) while mirroring, first one: unable to list /a/: HTTP 403");

        let err = MirrorError {
            failures: Vec::new(),
            stats: MirrorStats::default(),
            timed_out: true,
            discarded_partials: vec![PathBuf::from("/tmp/.x.partial")],
        };
        assert_eq!(err.to_string(), "mirror timed out (1 incomplete downloads discarded)");
    }
}
