//! # Frame Decoding
//!
//! Raw bytes to RGBA frames.
//!
//! - GIF: every composited frame, each copied out into its own buffer
//! - Anything else: a single frame
//! - Everything is normalized to RGBA8
use std::io::Cursor;

use image::{
    AnimationDecoder, DynamicImage, ImageFormat, RgbaImage, codecs::gif::GifDecoder,
    imageops::FilterType,
};

use crate::error::DecodeError;

pub const THUMBNAIL_SIZE: u32 = 300;

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub image: RgbaImage,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

fn is_gif(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(ImageFormat::Gif))
}

pub fn decode_frames(bytes: &[u8]) -> Result<Vec<Frame>, DecodeError> {
    let images: Vec<RgbaImage> = if is_gif(bytes) {
        GifDecoder::new(Cursor::new(bytes))?
            .into_frames()
            .collect_frames()?
            .into_iter()
            .map(|frame| frame.into_buffer())
            .collect()
    } else {
        vec![image::load_from_memory(bytes)?.to_rgba8()]
    };

    if images.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(images
        .into_iter()
        .enumerate()
        .map(|(index, image)| Frame { index, image })
        .collect())
}

/// Decodes only as far as the first frame.
pub fn decode_first(bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
    if is_gif(bytes) {
        return GifDecoder::new(Cursor::new(bytes))?
            .into_frames()
            .next()
            .ok_or(DecodeError::Empty)?
            .map(|frame| frame.into_buffer())
            .map_err(DecodeError::from);
    }

    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Concatenates per-file frame lists in order, renumbering indices.
pub fn concat_frames<I>(lists: I) -> Vec<Frame>
where
    I: IntoIterator,
    I::Item: AsRef<[Frame]>,
{
    lists
        .into_iter()
        .flat_map(|list| list.as_ref().to_vec())
        .enumerate()
        .map(|(index, frame)| Frame { index, ..frame })
        .collect()
}

/// Fits inside `size` x `size`, keeping the aspect ratio.
pub fn thumbnail(image: &RgbaImage, size: u32) -> RgbaImage {
    DynamicImage::ImageRgba8(image.clone())
        .resize(size, size, FilterType::Triangle)
        .to_rgba8()
}
