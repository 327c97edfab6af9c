//! # Gallery
//!
//! Domain core of the album viewer: dated albums of GIF/PNG image sets, browsed page by page
//! and stepped through frame by frame.
//!
//! ## Flow
//! - [`credentials`] gates everything
//! - [`storage`] lists albums and files and downloads bytes (Drive, local directory, or per-day ZIPs)
//! - [`pagination`] picks the visible slice of image sets
//! - [`library`] materializes thumbnails and frames through [`decode`] and [`cache`]
//! - [`view`] tracks where a session is and which transitions are allowed
//!
//! ## Image set naming
//! ```text
//! 2024-01-01/
//!   pic_th.png   thumbnail
//!   pic_1.png    frame 1
//!   pic_2.png    frame 2
//!   anim.gif     a set of its own, frames come from the GIF itself
//! ```
pub mod cache;
pub mod credentials;
pub mod decode;
pub mod error;
pub mod image_set;
pub mod library;
pub mod pagination;
pub mod storage;
pub mod view;

pub use error::{DecodeError, GalleryError, StorageError};
