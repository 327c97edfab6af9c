use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gallery::{GalleryError, StorageError, view::ViewError};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("Unknown album: {0}")]
    UnknownAlbum(String),

    #[error("Unknown image: {0}")]
    UnknownImage(String),

    #[error("No albums available")]
    NoAlbums,

    #[error(transparent)]
    Gallery(#[from] GalleryError),

    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        AppError::Gallery(error.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::View(ViewError::LoginRequired)
            | AppError::View(ViewError::InvalidCredentials)
            | AppError::View(ViewError::UnknownTenant(_)) => StatusCode::UNAUTHORIZED,
            AppError::View(ViewError::NoSelection)
            | AppError::View(ViewError::FrameOutOfRange { .. }) => StatusCode::BAD_REQUEST,
            AppError::UnknownAlbum(_) | AppError::UnknownImage(_) | AppError::NoAlbums => {
                StatusCode::NOT_FOUND
            }
            AppError::Gallery(GalleryError::Storage(StorageError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            AppError::Gallery(GalleryError::Storage(_)) => StatusCode::BAD_GATEWAY,
            AppError::Gallery(GalleryError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Gallery(GalleryError::Task(_)) | AppError::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            warn!("{self}");
        }

        (status, self.to_string()).into_response()
    }
}
