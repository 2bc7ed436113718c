use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use url::Url;

use collectives_backup::backup;
use collectives_backup::client::Client;
use collectives_backup::config::{BackupConfig, DEFAULT_ARCHIVE_PREFIX};
use collectives_backup::progress::{feedback_channel, Progress};

/// Back up a Nextcloud folder: download it, zip it, upload the archive to a backup folder and rotate old archives
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Base URL of the server
    #[arg(long, env = "NC_URL")]
    url: Url,

    /// User that owns both folders
    #[arg(long, env = "NC_ANCHOR_USER")]
    user: String,

    /// App password of this user
    #[arg(long, env = "NC_ANCHOR_APP_PW", hide_env_values = true)]
    app_password: String,

    /// Folder to back up, relative to the user's files
    #[arg(long, env = "NC_COLLECTIVES_FOLDER")]
    source_folder: String,

    /// Folder the archives are uploaded to, relative to the user's files
    #[arg(long, env = "NC_COLLECTIVES_BACKUP_FOLDER")]
    backup_folder: String,

    /// How many archives to keep in the backup folder. Old archives are never deleted if this is not set
    #[arg(long, env = "NC_COLLECTIVES_BACKUP_COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    keep: Option<u32>,

    /// Where the staging directory and the archive are created
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_ARCHIVE_PREFIX)]
    archive_prefix: String,

    /// Maximum number of simultaneous requests
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    workers: u32,

    /// Deepest folder level that is backed up
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Give up mirroring (and pruning) after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<BackupConfig, Box<dyn std::error::Error>> {
        let mut config = BackupConfig::new(self.url, self.user, self.app_password, &self.source_folder, &self.backup_folder)?;
        config.keep = self.keep.map(|k| k as usize);
        config.work_dir = self.work_dir;
        config.archive_prefix = self.archive_prefix;
        config.workers = self.workers as usize;
        config.max_depth = self.max_depth;
        config.timeout = self.timeout_secs.map(Duration::from_secs);
        config.validate()?;
        Ok(config)
    }
}


#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        },
    };

    let client = match Client::from_resource(config.resource().clone()) {
        Ok(client) => client,
        Err(err) => {
            log::error!("Unable to create a client: {}", err);
            return ExitCode::FAILURE;
        },
    };

    let (sender, mut receiver) = feedback_channel();
    let watcher = tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            let event = receiver.borrow().clone();
            println!("{}", event);
        }
    });

    let mut progress = Progress::new_with_feedback_channel(sender);
    let result = backup::run(&client, &config, &mut progress).await;
    drop(progress);
    let _ = watcher.await;

    match result {
        Ok(report) => {
            println!("Backup {} uploaded ({} files, {} bytes). {} old backup(s) deleted.",
                report.archive_name, report.mirrored.files, report.mirrored.bytes, report.pruned.deleted);
            ExitCode::SUCCESS
        },
        Err(_) => ExitCode::FAILURE,
    }
}
