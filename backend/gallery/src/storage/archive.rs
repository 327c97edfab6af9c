//! # Archives
//!
//! One ZIP per album date, extracted once and then served from disk.
//!
//! - Extraction directory: `<root>/<tenant>/<date>/<sha256(version)[..16]>`
//! - Version is the archive checksum when known, the modification time otherwise
//! - Without a checksum, an archive rewritten under the same timestamp is served stale
//! - Extraction lands in a `.partial` sibling first and is renamed into place once complete
use std::{
    fs::{self, File},
    io::{self, Cursor},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zip::ZipArchive;

use super::{FileRef, StorageGateway};
use crate::{cache::MemoCache, error::StorageError};

const UNVERSIONED: &str = "unversioned";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveKey {
    pub tenant_id: String,
    pub album_date: String,
    pub version: String,
}

pub struct ArchiveCache {
    root: PathBuf,
    extractions: MemoCache<ArchiveKey, PathBuf>,
}

impl ArchiveCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extractions: MemoCache::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extraction_dir(&self, key: &ArchiveKey) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(key.version.as_bytes()));

        self.root
            .join(path_segment(&key.tenant_id))
            .join(path_segment(&key.album_date))
            .join(&digest[..16])
    }

    /// Downloads and extracts `archive` unless the matching extraction directory already exists.
    pub async fn fetch_archive_and_extract(
        &self,
        gateway: &dyn StorageGateway,
        tenant_id: &str,
        album_date: &str,
        archive: &FileRef,
    ) -> Result<PathBuf, StorageError> {
        let key = ArchiveKey {
            tenant_id: tenant_id.to_string(),
            album_date: album_date.to_string(),
            version: archive.version().unwrap_or_else(|| UNVERSIONED.to_string()),
        };
        let target = self.extraction_dir(&key);

        self.extractions
            .get_or_try_insert_with(key, || async move {
                if tokio::fs::try_exists(&target).await? {
                    debug!("Reusing extraction {}", target.display());
                    return Ok(target);
                }

                info!("Extracting archive {} into {}", archive.name, target.display());
                let data = gateway.fetch_bytes(&archive.id).await?;

                let dir = target.clone();
                tokio::task::spawn_blocking(move || extract_atomically(data, &dir)).await??;

                Ok::<_, StorageError>(target)
            })
            .await
    }
}

fn path_segment(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn extract_atomically(data: Bytes, target: &Path) -> Result<(), StorageError> {
    let partial = target.with_extension("partial");
    if partial.exists() {
        fs::remove_dir_all(&partial)?;
    }
    fs::create_dir_all(&partial)?;

    extract_zip_to_dir(data, &partial)?;

    match fs::rename(&partial, target) {
        Ok(()) => Ok(()),
        // Another process finished the same extraction first.
        Err(_) if target.exists() => {
            fs::remove_dir_all(&partial)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn extract_zip_to_dir(data: Bytes, dst_dir: &Path) -> Result<(), StorageError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe entry {}", entry.name());
            continue;
        };

        let out_path = dst_dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;
    }

    Ok(())
}
