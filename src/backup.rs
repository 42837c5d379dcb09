use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{LedgerError, Result};
use crate::persist::timestamp_fragment;

/// Outcome of a ZIP backup run: the archive path plus per-directory file
/// counts for the tool response.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipBackupSummary {
    pub archive: String,
    pub file_counts: BTreeMap<String, usize>,
    pub total_files: usize,
}

/// Bundles every file under the named directories into
/// `<backup_dir>/backup_<UTC>.zip`. Directory names become the top-level
/// folders inside the archive.
pub fn create_zip_backup(
    backup_dir: &Path,
    directories: &[PathBuf],
    now: DateTime<Utc>,
) -> Result<ZipBackupSummary> {
    fs::create_dir_all(backup_dir)?;
    let archive_path = backup_dir.join(format!("backup_{}.zip", timestamp_fragment(now)));
    let file = fs::File::create(&archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut file_counts = BTreeMap::new();
    for dir in directories {
        if !dir.is_dir() {
            return Err(LedgerError::Validation(format!(
                "'{}' is not a directory",
                dir.display()
            )));
        }
        let label = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dir")
            .to_string();
        let mut count = 0usize;
        add_dir(&mut zip, options, dir, &label, &mut count)?;
        file_counts.insert(label, count);
    }
    zip.finish()
        .map_err(|e| LedgerError::Io(std::io::Error::other(e)))?;

    let total_files = file_counts.values().sum();
    info!(
        "wrote {} ({} files from {} directories)",
        archive_path.display(),
        total_files,
        directories.len()
    );
    Ok(ZipBackupSummary {
        archive: archive_path.display().to_string(),
        file_counts,
        total_files,
    })
}

fn add_dir(
    zip: &mut ZipWriter<fs::File>,
    options: SimpleFileOptions,
    dir: &Path,
    prefix: &str,
    count: &mut usize,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let archived = format!("{}/{}", prefix, name);
        if path.is_dir() {
            add_dir(zip, options, &path, &archived, count)?;
        } else {
            zip.start_file(archived.as_str(), options)
                .map_err(|e| LedgerError::Io(std::io::Error::other(e)))?;
            zip.write_all(&fs::read(&path)?)?;
            *count += 1;
        }
    }
    Ok(())
}
