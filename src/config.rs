//! Configuration of a backup run

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::mirror::MirrorSettings;
use crate::prune::PruneSettings;
use crate::resource::Resource;

/// The archive names are `<prefix><timestamp>.zip`
pub const DEFAULT_ARCHIVE_PREFIX: &str = "collectives_backup_";
pub const ARCHIVE_EXTENSION: &str = ".zip";
/// Name of the staging directory, inside the work directory
pub const STAGING_DIR_NAME: &str = "temp_collectives";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("the number of backups to keep must be at least 1")]
    ZeroRetention,
    #[error("at least one worker is needed")]
    NoWorkers,
    #[error("{0} cannot be used as a base URL")]
    InvalidUrl(String),
}


/// Everything a backup run needs to know
#[derive(Clone, Debug)]
pub struct BackupConfig {
    resource: Resource,
    source_folder: String,
    backup_folder: String,
    /// How many archives are kept in the backup folder. `None` means old archives are never pruned
    pub keep: Option<usize>,
    /// Where the staging directory and the archive are created
    pub work_dir: PathBuf,
    pub archive_prefix: String,
    pub workers: usize,
    pub max_depth: usize,
    pub timeout: Option<Duration>,
}

impl BackupConfig {
    /// Create a configuration with default tuning values. Folders are relative to the user's files root, not percent-encoded
    pub fn new<T: ToString, U: ToString>(
        server: Url,
        username: T,
        password: U,
        source_folder: &str,
        backup_folder: &str,
    ) -> Result<Self, ConfigError> {
        if server.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(server.to_string()));
        }
        let username = username.to_string();
        if username.is_empty() {
            return Err(ConfigError::Empty("username"));
        }
        let source_folder = source_folder.trim_matches('/');
        if source_folder.is_empty() {
            return Err(ConfigError::Empty("source folder"));
        }
        let backup_folder = backup_folder.trim_matches('/');
        if backup_folder.is_empty() {
            return Err(ConfigError::Empty("backup folder"));
        }

        let mirror_defaults = MirrorSettings::default();
        Ok(Self {
            resource: Resource::new(server, username, password.to_string()),
            source_folder: source_folder.to_string(),
            backup_folder: backup_folder.to_string(),
            keep: None,
            work_dir: PathBuf::from("."),
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            workers: mirror_defaults.workers,
            max_depth: mirror_defaults.max_depth,
            timeout: mirror_defaults.timeout,
        })
    }

    /// Check the tuning values, that may have been changed after [`Self::new`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep == Some(0) {
            return Err(ConfigError::ZeroRetention);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.archive_prefix.is_empty() {
            return Err(ConfigError::Empty("archive prefix"));
        }
        Ok(())
    }

    pub fn resource(&self) -> &Resource { &self.resource }

    /// The collection that is backed up, e.g. `/remote.php/dav/files/anchor/Collectives/`
    pub fn source_path(&self) -> String {
        self.user_path(&self.source_folder)
    }

    /// The collection where the archives are uploaded
    pub fn target_path(&self) -> String {
        self.user_path(&self.backup_folder)
    }

    fn user_path(&self, folder: &str) -> String {
        self.resource.collection_path(&["remote.php", "dav", "files", self.resource.username().as_str(), folder])
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir.join(STAGING_DIR_NAME)
    }

    pub fn mirror_settings(&self) -> MirrorSettings {
        MirrorSettings {
            workers: self.workers,
            max_depth: self.max_depth,
            timeout: self.timeout,
        }
    }

    pub fn prune_settings(&self) -> PruneSettings {
        PruneSettings {
            marker: self.archive_prefix.clone(),
            extension: ARCHIVE_EXTENSION.to_string(),
            workers: self.workers,
            timeout: self.timeout,
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn config() -> BackupConfig {
        BackupConfig::new(
            "https://cloud.example.com".parse().unwrap(),
            "anchor", "app-password",
            "/Collectives/", "Backups/Collectives old",
        ).unwrap()
    }

    #[test]
    fn paths() {
        let config = config();
        assert_eq!(config.source_path(), "/remote.php/dav/files/anchor/Collectives/");
        assert_eq!(config.target_path(), "/remote.php/dav/files/anchor/Backups/Collectives%20old/");
        assert_eq!(config.staging_dir(), PathBuf::from("./temp_collectives"));
        assert_eq!(config.prune_settings().marker, "collectives_backup_");
    }

    #[test]
    fn paths_below_a_sub_directory() {
        let config = BackupConfig::new(
            "https://cloud.example.com/nextcloud/".parse().unwrap(),
            "anchor", "app-password",
            "Collectives", "Backups",
        ).unwrap();
        assert_eq!(config.source_path(), "/nextcloud/remote.php/dav/files/anchor/Collectives/");
        assert_eq!(config.target_path(), "/nextcloud/remote.php/dav/files/anchor/Backups/");
    }

    #[test]
    fn validation() {
        let mut config = config();
        assert_eq!(config.validate(), Ok(()));

        config.keep = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRetention));
        config.keep = Some(3);
        config.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));

        let err = BackupConfig::new("https://cloud.example.com".parse().unwrap(), "anchor", "pw", "/", "Backups").unwrap_err();
        assert_eq!(err, ConfigError::Empty("source folder"));
        let err = BackupConfig::new("mailto:someone@example.com".parse().unwrap(), "anchor", "pw", "a", "b").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }
}
