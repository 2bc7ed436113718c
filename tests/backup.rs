//! Full backup runs, against a mocked server

use std::io::{Cursor, Read};

use collectives_backup::backup::{self, BackupError};
use collectives_backup::config::BackupConfig;
use collectives_backup::memory::MemoryDav;
use collectives_backup::progress::{feedback_channel, BackupEvent, Progress};
use collectives_backup::DavError;

const SOURCE: &str = "/remote.php/dav/files/anchor/Collectives";
const BACKUPS: &str = "/remote.php/dav/files/anchor/Backups";

fn server() -> MemoryDav {
    let dav = MemoryDav::new();
    dav.add_file(&format!("{}/readme.md", SOURCE), b"# Collectives\n", None);
    dav.add_file(&format!("{}/Team A/report (final).txt", SOURCE), b"final version", None);
    dav.add_collection(&format!("{}/Empty", SOURCE));
    dav.add_file(&format!("{}/collectives_backup_2023-01-01_00-00-00.zip", BACKUPS), b"PK", Some("Sun, 01 Jan 2023 00:00:00 GMT"));
    dav.add_file(&format!("{}/collectives_backup_2023-06-01_00-00-00.zip", BACKUPS), b"PK", Some("Thu, 01 Jun 2023 00:00:00 GMT"));
    dav
}

fn config(work_dir: &std::path::Path) -> BackupConfig {
    let mut config = BackupConfig::new(
        "https://cloud.example.com".parse().unwrap(),
        "anchor", "app-password",
        "Collectives", "Backups",
    ).unwrap();
    config.work_dir = work_dir.to_path_buf();
    config.keep = Some(2);
    config
}


#[tokio::test]
async fn test_full_backup() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dav = server();
    let temp = tempfile::tempdir().unwrap();
    let config = config(temp.path());
    let (sender, receiver) = feedback_channel();
    let mut progress = Progress::new_with_feedback_channel(sender);

    let report = backup::run(&dav, &config, &mut progress).await.unwrap();

    // One archive has been uploaded
    let uploads = dav.uploads();
    assert_eq!(uploads, vec![format!("{}/{}", BACKUPS, report.archive_name)]);
    assert_eq!(report.mirrored.files, 2);

    // ...and it contains the mirrored tree
    let bytes = dav.file_content(&uploads[0]).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    assert_eq!(names, vec!["Empty/", "Team A/", "Team A/report (final).txt", "readme.md"]);
    let mut content = String::new();
    archive.by_name("Team A/report (final).txt").unwrap().read_to_string(&mut content).unwrap();
    assert_eq!(content, "final version");

    // The oldest archive has been pruned
    assert_eq!(report.pruned.deleted, 1);
    assert!(dav.contains(&format!("{}/collectives_backup_2023-01-01_00-00-00.zip", BACKUPS)) == false);
    assert!(dav.contains(&format!("{}/collectives_backup_2023-06-01_00-00-00.zip", BACKUPS)));

    // Nothing is left locally
    assert!(config.staging_dir().exists() == false);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);

    assert!(progress.is_success());
    assert_eq!(*receiver.borrow(), BackupEvent::Finished{ success: true });
}

#[tokio::test]
async fn test_incomplete_mirror_is_not_uploaded() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dav = server();
    dav.fail_fetch_of(&format!("{}/readme.md", SOURCE));
    let temp = tempfile::tempdir().unwrap();
    let config = config(temp.path());
    let mut progress = Progress::new();

    let err = backup::run(&dav, &config, &mut progress).await.unwrap_err();

    assert!(matches!(err, BackupError::Mirror(_)));
    assert!(dav.uploads().is_empty());
    assert_eq!(dav.delete_calls(), 0);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    assert!(progress.is_success() == false);
}

#[tokio::test]
async fn test_missing_backup_folder() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dav = MemoryDav::new();
    dav.add_file(&format!("{}/readme.md", SOURCE), b"# Collectives\n", None);
    let temp = tempfile::tempdir().unwrap();
    let config = config(temp.path());

    let err = backup::run(&dav, &config, &mut Progress::new()).await.unwrap_err();

    assert!(matches!(err, BackupError::Upload(DavError::UploadFailed { .. })));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_without_retention_nothing_is_pruned() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dav = server();
    let temp = tempfile::tempdir().unwrap();
    let mut config = config(temp.path());
    config.keep = None;

    let report = backup::run(&dav, &config, &mut Progress::new()).await.unwrap();

    assert_eq!(report.pruned.deleted, 0);
    assert_eq!(dav.delete_calls(), 0);
    assert_eq!(dav.children_of(BACKUPS).len(), 3);
}

#[tokio::test]
async fn test_invalid_configuration() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dav = server();
    let temp = tempfile::tempdir().unwrap();
    let mut config = config(temp.path());
    config.keep = Some(0);

    let err = backup::run(&dav, &config, &mut Progress::new()).await.unwrap_err();
    assert!(matches!(err, BackupError::Config(_)));
    assert_eq!(dav.list_calls(), 0);
}
