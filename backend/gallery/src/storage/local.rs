//! Albums as plain directories: `<root>/<date>/<files>`.
//!
//! Ids are root-relative paths joined with `/`, the empty id is the root itself.
use std::{
    path::{Component, Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use walkdir::WalkDir;

use super::{FileRef, Folder, MimeFilter, StorageGateway, mime_from_name};
use crate::error::StorageError;

#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects absolute ids and anything with `..`.
    pub fn resolve(&self, id: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));

        if escapes {
            return Err(StorageError::InvalidPath(id.to_string()));
        }

        Ok(self.root.join(relative))
    }

    pub fn id_for(&self, path: &Path) -> Result<String, StorageError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath(path.display().to_string()))?;

        Ok(relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"))
    }

    fn file_ref(&self, path: &Path, modified: Option<SystemTime>) -> Option<FileRef> {
        let name = path.file_name()?.to_str()?.to_string();
        let id = self.id_for(path).ok()?;

        Some(FileRef {
            id,
            mime_type: mime_from_name(&name).to_string(),
            name,
            modified_time: modified.map(DateTime::<Utc>::from),
            checksum: None,
        })
    }

    /// Every matching file below `parent`, nested directories included, ordered by name.
    pub async fn list_files_recursive(
        &self,
        parent: &str,
        filter: MimeFilter,
    ) -> Result<Vec<FileRef>, StorageError> {
        let dir = self.resolve(parent)?;
        let storage = self.clone();

        let mut files = tokio::task::spawn_blocking(move || -> Result<Vec<FileRef>, StorageError> {
            let mut files = Vec::new();
            for entry in WalkDir::new(&dir).follow_links(false) {
                let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let modified = entry.metadata().ok().and_then(|meta| meta.modified().ok());
                if let Some(file) = storage.file_ref(entry.path(), modified) {
                    if filter.matches(&file.mime_type) {
                        files.push(file);
                    }
                }
            }
            Ok(files)
        })
        .await??;

        files.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(files)
    }
}

#[async_trait]
impl StorageGateway for LocalStorage {
    async fn list_folders(&self, parent: &str) -> Result<Vec<Folder>, StorageError> {
        let mut entries = fs::read_dir(self.resolve(parent)?).await?;
        let mut folders = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            folders.push(Folder {
                id: self.id_for(&path)?,
                name: name.to_string(),
            });
        }

        Ok(folders)
    }

    async fn list_files(
        &self,
        parent: &str,
        filter: MimeFilter,
    ) -> Result<Vec<FileRef>, StorageError> {
        let mut entries = fs::read_dir(self.resolve(parent)?).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            if let Some(file) = self.file_ref(&entry.path(), metadata.modified().ok()) {
                if filter.matches(&file.mime_type) {
                    files.push(file);
                }
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn fetch_bytes(&self, file_id: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve(file_id)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
