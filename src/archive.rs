//! Packaging of a local directory into a zip archive

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to walk the directory to archive: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("unable to write the archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}


/// Zip the content of `src_dir` into `dest`, and return how many files were archived.
///
/// Entries are named after their path relative to `src_dir` (`src_dir` itself is not part of the names).
/// Directories get their own entries, so that empty ones are kept.
pub fn zip_directory(src_dir: &Path, dest: &Path) -> Result<u64, ArchiveError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ArchiveError::Io { path, source }
    };

    let file = File::create(dest).map_err(io_error(dest))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated);

    let mut n_files: u64 = 0;
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(src_dir) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let name = relative.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_file() {
            log::trace!("Archiving {}", name);
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path()).map_err(io_error(entry.path()))?;
            std::io::copy(&mut input, &mut zip).map_err(io_error(entry.path()))?;
            n_files += 1;
        }
    }

    let mut writer = zip.finish()?;
    writer.flush().map_err(io_error(dest))?;
    log::info!("Archived {} files into {:?}", n_files, dest);
    Ok(n_files)
}
