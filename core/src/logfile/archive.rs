//! Log containers
//!
//! Logs are newline separated text, stored plain or compressed. The container
//! is picked from the file name:
//!
//! | suffix     | container                                              |
//! |------------|--------------------------------------------------------|
//! | `.tar.bz2` | bzip2 tarball, first entry whose path ends with a suffix |
//! | `.bz2`     | bzip2 stream                                           |
//! | `.gz`      | gzip stream                                            |
//! | `.zip`     | zip with exactly one entry                             |
//! | other      | plain text                                             |

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use tracing::debug;

use super::LogError;

/// Default suffix of the log entry inside `.tar.bz2` archives.
pub const DEFAULT_TAR_ENTRY_SUFFIX: &str = "sparkmonitor.log";

/// Container format of a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Plain,
    Gzip,
    Bzip2,
    Zip,
    TarBz2,
}

impl ArchiveKind {
    /// Container format from the file name.
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.bz2") {
            ArchiveKind::TarBz2
        } else if name.ends_with(".bz2") {
            ArchiveKind::Bzip2
        } else if name.ends_with(".gz") {
            ArchiveKind::Gzip
        } else if name.ends_with(".zip") {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Plain
        }
    }

    /// Whether byte offsets in the file are offsets into the log text.
    pub fn is_plain(self) -> bool {
        self == ArchiveKind::Plain
    }
}

/// Open a log for line reading, decoding its container.
pub fn open_decoded_stream(path: &Path) -> Result<Box<dyn BufRead + Send>, LogError> {
    open_decoded_stream_with(path, DEFAULT_TAR_ENTRY_SUFFIX)
}

/// Open a log, selecting the tarball entry by `tar_entry_suffix`.
///
/// Zip and tar entries are read into memory; the other containers stream.
pub fn open_decoded_stream_with(
    path: &Path,
    tar_entry_suffix: &str,
) -> Result<Box<dyn BufRead + Send>, LogError> {
    let kind = ArchiveKind::detect(path);
    debug!("opening {:?} log {}", kind, path.display());
    let file = File::open(path)?;

    Ok(match kind {
        ArchiveKind::Plain => Box::new(BufReader::new(file)),
        ArchiveKind::Gzip => Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file))),
        ArchiveKind::Bzip2 => Box::new(BufReader::new(bzip2::read::MultiBzDecoder::new(file))),
        ArchiveKind::Zip => Box::new(Cursor::new(read_zip_entry(path, file)?)),
        ArchiveKind::TarBz2 => Box::new(Cursor::new(read_tar_entry(path, file, tar_entry_suffix)?)),
    })
}

fn read_zip_entry(path: &Path, file: File) -> Result<Vec<u8>, LogError> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| LogError::Archive {
        path: path.to_path_buf(),
        reason: format!("not a valid zip file: {}", e),
    })?;

    if archive.len() != 1 {
        return Err(LogError::Archive {
            path: path.to_path_buf(),
            reason: format!("expected 1 entry in zip, found {}", archive.len()),
        });
    }

    let mut entry = archive.by_index(0).map_err(|e| LogError::Archive {
        path: path.to_path_buf(),
        reason: format!("cannot read zip entry: {}", e),
    })?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(data)
}

fn read_tar_entry(path: &Path, file: File, suffix: &str) -> Result<Vec<u8>, LogError> {
    let mut archive = tar::Archive::new(bzip2::read::MultiBzDecoder::new(file));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let matches = entry
            .path()
            .map(|p| p.to_string_lossy().ends_with(suffix))
            .unwrap_or(false);
        if matches {
            debug!("reading tar entry {:?}", entry.path().ok());
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            return Ok(data);
        }
    }
    Err(LogError::EntryNotFound {
        path: path.to_path_buf(),
        suffix: suffix.to_string(),
    })
}

/// Create a log file for writing, compressing by suffix (`.gz`, `.bz2`).
pub fn create_encoded_writer(path: &Path) -> Result<Box<dyn Write + Send>, LogError> {
    let file = BufWriter::new(File::create(path)?);
    Ok(match ArchiveKind::detect(path) {
        ArchiveKind::Gzip => Box::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        )),
        ArchiveKind::Bzip2 => Box::new(bzip2::write::BzEncoder::new(
            file,
            bzip2::Compression::default(),
        )),
        ArchiveKind::Plain => Box::new(file),
        other => {
            return Err(LogError::Archive {
                path: path.to_path_buf(),
                reason: format!("cannot write {:?} logs", other),
            });
        }
    })
}
