//! Upload archive - keeps a copy of every accepted prediction upload

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::constants::DEFAULT_UPLOAD_NAME;

pub struct UploadArchive {
    dir: PathBuf,
}

impl UploadArchive {
    /// Open the archive, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh unique name and return that name.
    /// No rotation or cleanup.
    pub async fn save(&self, bytes: &[u8], original_name: Option<&str>) -> io::Result<String> {
        let name = archive_name(original_name, Utc::now());
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        tracing::debug!("Archived upload as {}", name);
        Ok(name)
    }
}

/// `{UTC timestamp}_{uuid hex}_{original name with / and \ replaced}`
pub fn archive_name(original_name: Option<&str>, now: DateTime<Utc>) -> String {
    let safe_name = original_name
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .replace(['/', '\\'], "_");

    format!(
        "{}_{}_{}",
        now.format("%Y%m%dT%H%M%SZ"),
        Uuid::new_v4().simple(),
        safe_name
    )
}
