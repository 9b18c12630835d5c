use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Write-once directory of event snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

/// Keep camera ids filesystem-safe (`UNKNOWN-fe80::1` and friends)
fn sanitize(camera_id: &str) -> String {
    camera_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `snap_<camera>_<timestamp>[_<n>].<ext>`
    pub fn file_name(camera_id: &str, taken_at: DateTime<Utc>, index: usize, ext: &str) -> String {
        let stamp = taken_at.format("%Y%m%d_%H%M%S_%6f");
        match index {
            0 => format!("snap_{}_{}.{}", sanitize(camera_id), stamp, ext),
            n => format!("snap_{}_{}_{}.{}", sanitize(camera_id), stamp, n + 1, ext),
        }
    }

    /// Store `bytes` under its generated name. An existing file with that name is kept and its
    /// path returned.
    pub async fn save(
        &self,
        camera_id: &str,
        taken_at: DateTime<Utc>,
        index: usize,
        ext: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(Self::file_name(camera_id, taken_at, index, ext));

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Snapshot {} already stored", path.display());
                return Ok(path);
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(bytes).await?;
        file.flush().await?;
        info!("Saved snapshot {} ({} bytes)", path.display(), bytes.len());

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn snapshots_are_write_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path());
        let taken_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap();

        let first = store.save("CAM-02", taken_at, 0, "jpg", b"first").await?;
        let second = store.save("CAM-02", taken_at, 0, "jpg", b"second").await?;

        assert_eq!(first, second);
        assert_eq!(
            first.file_name().and_then(|n| n.to_str()),
            Some("snap_CAM-02_20240501_081500_000000.jpg")
        );
        assert_eq!(tokio::fs::read(&first).await?, b"first".to_vec());
        Ok(())
    }

    #[test]
    fn names_are_filesystem_safe() {
        let taken_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap();
        assert_eq!(
            SnapshotStore::file_name("UNKNOWN-fe80::1", taken_at, 1, "png"),
            "snap_UNKNOWN-fe80__1_20240501_081500_000000_2.png"
        );
    }
}
