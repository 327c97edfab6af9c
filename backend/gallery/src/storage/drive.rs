//! # Google Drive
//!
//! Drive v3 REST, read-only.
//!
//! - `files.list` with a parent + MIME query, field projection, ordered by name, following `nextPageToken`
//! - `files.get?alt=media` for content, consumed as a chunk stream
//!
//! The bearer token is injected configuration, token exchange is not done here.
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::{FOLDER_MIME, FileRef, Folder, MimeFilter, StorageGateway};
use crate::error::StorageError;

pub const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

const FILE_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, md5Checksum)";
const PAGE_SIZE: &str = "1000";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<FileRef>,
}

pub struct DriveStorage {
    client: Client,
    api: String,
    token: String,
}

impl DriveStorage {
    pub fn new(api: impl Into<String>, token: impl Into<String>) -> Result<Self, StorageError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent("album-viewer/0.1")
            .build()?;

        Ok(Self {
            client,
            api: api.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn list(&self, query: String, order_by: &str) -> Result<Vec<FileRef>, StorageError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", FILE_FIELDS),
                ("orderBy", order_by),
                ("pageSize", PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .client
                .get(format!("{}/files", self.api))
                .bearer_auth(&self.token)
                .query(&params)
                .send()
                .await?;

            let page: FileList = check(response).await?.json().await?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }
}

async fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status { status, body })
}

/// Single quotes and backslashes must be escaped inside Drive query literals.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folders_query(parent: &str) -> String {
    format!(
        "'{}' in parents and mimeType = '{FOLDER_MIME}' and trashed = false",
        quote(parent)
    )
}

pub fn files_query(parent: &str, filter: MimeFilter) -> String {
    format!(
        "'{}' in parents and {} and trashed = false",
        quote(parent),
        filter.query()
    )
}

#[async_trait]
impl StorageGateway for DriveStorage {
    async fn list_folders(&self, parent: &str) -> Result<Vec<Folder>, StorageError> {
        let files = self.list(folders_query(parent), "name desc").await?;

        Ok(files
            .into_iter()
            .map(|file| Folder {
                id: file.id,
                name: file.name,
            })
            .collect())
    }

    async fn list_files(
        &self,
        parent: &str,
        filter: MimeFilter,
    ) -> Result<Vec<FileRef>, StorageError> {
        let files = self.list(files_query(parent, filter), "name").await?;

        Ok(files
            .into_iter()
            .filter(|file| filter.matches(&file.mime_type))
            .collect())
    }

    async fn fetch_bytes(&self, file_id: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.api, file_id))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let response = check(response).await?;
        let mut buffer = match response.content_length() {
            Some(length) => BytesMut::with_capacity(length as usize),
            None => BytesMut::new(),
        };

        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        debug!("Downloaded {file_id} ({} bytes)", buffer.len());
        Ok(buffer.freeze())
    }
}
