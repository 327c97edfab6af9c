//! # Storage
//!
//! Read-only view of wherever the albums live.
//!
//! - Albums are folders under a tenant root, named by date
//! - Image files sit directly in the album folder
//! - Archive layout: the root instead holds one ZIP per date, see [`archive`]
//!
//! Listings are fetched fresh on every call, caching happens one level up on decoded artifacts.
use std::{fmt, path::Path, str::FromStr};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::StorageError;

pub mod archive;
pub mod drive;
pub mod local;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const GIF_MIME: &str = "image/gif";
pub const ZIP_MIME: &str = "application/zip";

const EXT_MIME: &[(&str, &str)] = &[
    ("gif", GIF_MIME),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("zip", ZIP_MIME),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "md5Checksum")]
    pub checksum: Option<String>,
}

impl FileRef {
    /// Content identity: checksum when the backend reports one, else the modification time.
    pub fn version(&self) -> Option<String> {
        self.checksum
            .clone()
            .or_else(|| self.modified_time.map(|time| time.to_rfc3339()))
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeFilter {
    Gif,
    AnyImage,
    Zip,
}

impl MimeFilter {
    pub fn matches(self, mime_type: &str) -> bool {
        match self {
            MimeFilter::Gif => mime_type == GIF_MIME,
            MimeFilter::AnyImage => mime_type.starts_with("image/"),
            MimeFilter::Zip => matches!(mime_type, ZIP_MIME | "application/x-zip-compressed"),
        }
    }

    /// Drive `files.list` query clause.
    pub fn query(self) -> &'static str {
        match self {
            MimeFilter::Gif => "mimeType = 'image/gif'",
            MimeFilter::AnyImage => "mimeType contains 'image/'",
            MimeFilter::Zip => "mimeType = 'application/zip'",
        }
    }
}

impl FromStr for MimeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gif" => Ok(MimeFilter::Gif),
            "image" | "images" => Ok(MimeFilter::AnyImage),
            "zip" => Ok(MimeFilter::Zip),
            other => Err(format!("unknown image filter '{other}', expected gif or image")),
        }
    }
}

impl fmt::Display for MimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeFilter::Gif => write!(f, "gif"),
            MimeFilter::AnyImage => write!(f, "image"),
            MimeFilter::Zip => write!(f, "zip"),
        }
    }
}

pub fn mime_from_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    EXT_MIME
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Child folders of `parent`, trashed entries excluded. No particular order.
    async fn list_folders(&self, parent: &str) -> Result<Vec<Folder>, StorageError>;

    /// Child files of `parent` matching `filter`, ordered by name.
    async fn list_files(&self, parent: &str, filter: MimeFilter)
    -> Result<Vec<FileRef>, StorageError>;

    /// Whole file, downloaded chunk by chunk. Any failed chunk fails the fetch.
    async fn fetch_bytes(&self, file_id: &str) -> Result<Bytes, StorageError>;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn file(name: &str) -> FileRef {
        FileRef {
            id: name.to_string(),
            name: name.to_string(),
            mime_type: mime_from_name(name).to_string(),
            modified_time: None,
            checksum: None,
        }
    }

    #[test]
    fn test_filters() {
        assert!(MimeFilter::Gif.matches("image/gif"));
        assert!(!MimeFilter::Gif.matches("image/png"));
        assert!(MimeFilter::AnyImage.matches("image/png"));
        assert!(MimeFilter::AnyImage.matches("image/gif"));
        assert!(!MimeFilter::AnyImage.matches("application/zip"));
        assert!(MimeFilter::Zip.matches("application/zip"));
    }

    #[test]
    fn test_filter_from_str() {
        assert_eq!("GIF".parse::<MimeFilter>().unwrap(), MimeFilter::Gif);
        assert_eq!("image".parse::<MimeFilter>().unwrap(), MimeFilter::AnyImage);
        assert!("video".parse::<MimeFilter>().is_err());
    }

    #[test]
    fn test_mime_from_name() {
        assert_eq!(mime_from_name("a.GIF"), "image/gif");
        assert_eq!(mime_from_name("a_th.png"), "image/png");
        assert_eq!(mime_from_name("2024-01-01.zip"), ZIP_MIME);
        assert_eq!(mime_from_name("notes"), "application/octet-stream");
    }

    #[test]
    fn test_version_prefers_checksum() {
        let mut f = file("pic.gif");
        assert_eq!(f.version(), None);

        f.modified_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(f.version().unwrap(), "2024-01-01T00:00:00+00:00");

        f.checksum = Some("abc".to_string());
        assert_eq!(f.version().unwrap(), "abc");
    }

    #[test]
    fn test_stem() {
        assert_eq!(file("pic_th.png").stem(), "pic_th");
        assert_eq!(file("2024-01-01.zip").stem(), "2024-01-01");
    }
}
