use reqwest::StatusCode;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image contains no frames")]
    Empty,
}

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
}
