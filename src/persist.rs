use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;

use crate::error::Result;

/// Writes `content` to `path` atomically at the file level: write to a
/// sibling temp file, then rename over the target.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// UTC timestamp fragment used in backup filenames, second precision.
pub fn timestamp_fragment(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Copies `path` into the backup directory as
/// `<stem>_<timestamp>.<ext>`. Returns the snapshot path.
pub fn snapshot_into(path: &Path, backup_dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("snapshot");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("bak");
    let target = backup_dir.join(format!("{}_{}.{}", stem, timestamp_fragment(now), ext));
    fs::copy(path, &target)?;
    Ok(target)
}

/// Best-effort check that the newest snapshot of `stem` in `backup_dir` is
/// readable. Used when a write fails, before the data is reported lost.
pub fn verify_latest_snapshot(backup_dir: &Path, stem: &str) -> bool {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("backup directory {} unreadable: {}", backup_dir.display(), err);
            return false;
        }
    };
    let mut newest: Option<PathBuf> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(stem) {
            let path = entry.path();
            if newest.as_ref().map(|n| path > *n).unwrap_or(true) {
                newest = Some(path);
            }
        }
    }
    match newest {
        Some(path) => fs::read(&path).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_snapshot_filename_encodes_utc_second() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("general_journal.json");
        fs::write(&source, "[]").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 12, 30, 45).unwrap();
        let snap = snapshot_into(&source, &dir.path().join("backups"), now).unwrap();
        assert_eq!(
            snap.file_name().unwrap().to_str().unwrap(),
            "general_journal_20250131T123045Z.json"
        );
        assert!(verify_latest_snapshot(&dir.path().join("backups"), "general_journal"));
    }
}
