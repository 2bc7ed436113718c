//! The whole backup: mirror a remote folder, zip it, upload the archive, rotate old archives, clean up

use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::archive::{self, ArchiveError};
use crate::config::{BackupConfig, ConfigError, ARCHIVE_EXTENSION};
use crate::error::{DavError, MirrorError};
use crate::mirror::{self, MirrorStats};
use crate::node::encode_segment;
use crate::progress::{BackupEvent, BackupStep, Progress};
use crate::prune::{self, PruneReport};
use crate::traits::DavSource;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("mirroring failed: {0}")]
    Mirror(#[from] MirrorError),
    #[error("archiving failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error("upload failed: {0}")]
    Upload(DavError),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a successful backup did
#[derive(Debug)]
pub struct BackupReport {
    /// Name of the uploaded archive
    pub archive_name: String,
    pub mirrored: MirrorStats,
    pub pruned: PruneReport,
}


/// The name of an archive created now
pub fn archive_name(prefix: &str) -> String {
    format!("{}{}{}", prefix, Local::now().format("%Y-%m-%d_%H-%M-%S"), ARCHIVE_EXTENSION)
}

/// Run a full backup.
///
/// Nothing is uploaded in case the remote folder could not be completely mirrored.
/// The local staging directory and archive are removed in any case.
pub async fn run<S>(source: &S, config: &BackupConfig, progress: &mut Progress) -> Result<BackupReport, BackupError>
where
    S: DavSource + ?Sized,
{
    progress.info("Starting a backup.");
    progress.feedback(BackupEvent::Started);

    let archive_name = archive_name(&config.archive_prefix);
    let archive_path = config.work_dir.join(&archive_name);

    let result = match config.validate() {
        Err(err) => Err(err.into()),
        Ok(()) => {
            let result = run_inner(source, config, &archive_name, &archive_path, progress).await;
            cleanup(&config.staging_dir(), &archive_path, progress).await;
            result
        },
    };

    match &result {
        Ok(report) => progress.info(&format!("Backup {} finished, {} old backup(s) pruned", report.archive_name, report.pruned.deleted)),
        Err(err) => progress.error(&format!("Backup terminated because of an error: {}", err)),
    }
    progress.feedback(BackupEvent::Finished{ success: progress.is_success() });
    result
}

async fn run_inner<S>(source: &S, config: &BackupConfig, archive_name: &str, archive_path: &Path, progress: &mut Progress) -> Result<BackupReport, BackupError>
where
    S: DavSource + ?Sized,
{
    // Step 1 - download everything
    let staging = config.staging_dir();
    progress.step(BackupStep::Mirroring, config.source_path());
    let mirrored = mirror::mirror(source, &config.source_path(), &staging, &config.mirror_settings()).await?;

    // Step 2 - zip it
    progress.step(BackupStep::Archiving, archive_name.to_string());
    let (src, dest) = (staging.clone(), archive_path.to_path_buf());
    tokio::task::spawn_blocking(move || archive::zip_directory(&src, &dest))
        .await
        .map_err(|err| BackupError::Io {
            path: archive_path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, err),
        })??;

    // Step 3 - upload it next to the previous ones
    let target = format!("{}{}", config.target_path(), encode_segment(archive_name));
    progress.step(BackupStep::Uploading, target.clone());
    let body = tokio::fs::read(archive_path).await
        .map_err(|source| BackupError::Io { path: archive_path.to_path_buf(), source })?;
    source.upload(&target, body).await.map_err(BackupError::Upload)?;
    progress.info("Upload successful!");

    // Step 4 - rotate
    progress.step(BackupStep::Pruning, config.target_path());
    let pruned = match prune::prune(source, &config.target_path(), config.keep, &config.prune_settings()).await {
        Ok(report) => {
            for failure in &report.failed {
                progress.warn(&format!("Unable to prune an old backup: {}", failure));
            }
            report
        },
        Err(err) => {
            progress.warn(&format!("Old backups have not all been pruned: {}", err));
            PruneReport::default()
        },
    };

    Ok(BackupReport {
        archive_name: archive_name.to_string(),
        mirrored,
        pruned,
    })
}

/// Remove the local leftovers of a backup
async fn cleanup(staging: &Path, archive_path: &Path, progress: &mut Progress) {
    progress.step(BackupStep::CleaningUp, format!("{:?}", staging));

    match tokio::fs::remove_dir_all(staging).await {
        Ok(()) => {},
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
        Err(err) => progress.warn(&format!("Unable to remove staging directory {:?}: {}", staging, err)),
    }
    match tokio::fs::remove_file(archive_path).await {
        Ok(()) => {},
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
        Err(err) => progress.warn(&format!("Unable to remove local archive {:?}: {}", archive_path, err)),
    }
}
