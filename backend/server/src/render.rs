//! # Render
//!
//! Pure functions from already-loaded data to the JSON view the frontend draws.
//!
//! Images travel inline as `data:image/png;base64,...` URIs.
use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use gallery::{
    decode::Frame,
    image_set::ImageSet,
    library::Album,
    pagination::{Page, PageNav},
};
use image::{ImageError, ImageFormat, RgbaImage};
use serde::Serialize;

#[derive(Serialize, Debug)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum View {
    Home(HomeView),
    Viewer(ViewerView),
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct AlbumEntry {
    pub id: String,
    pub name: String,
}

/// Target page index per button, `None` when disabled.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Pager {
    pub first: Option<usize>,
    pub previous: Option<usize>,
    pub next: Option<usize>,
    pub last: Option<usize>,
}

/// `thumbnail` is `None` when it could not be built; the grid shows a placeholder.
#[derive(Serialize, Debug)]
pub struct GridItem {
    pub key: String,
    pub frames: usize,
    pub thumbnail: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct HomeView {
    pub albums: Vec<AlbumEntry>,
    /// `None` when there are no albums at all.
    pub album: Option<AlbumEntry>,
    pub page_index: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// 1-based, inclusive. `0..0` for an empty album.
    pub showing: (usize, usize),
    pub pager: Option<Pager>,
    pub items: Vec<GridItem>,
}

#[derive(Serialize, Debug)]
pub struct ViewerView {
    pub album: AlbumEntry,
    pub key: String,
    pub frame_index: usize,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
    pub frame: String,
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub buttons: Vec<FrameButton>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct FrameButton {
    pub index: usize,
    pub label: usize,
    pub current: bool,
}

pub fn data_uri(image: &RgbaImage) -> Result<String, ImageError> {
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;

    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png.into_inner())
    ))
}

fn entry(album: &Album) -> AlbumEntry {
    AlbumEntry {
        id: album.id.clone(),
        name: album.name.clone(),
    }
}

/// Only shown when there is more than one page.
pub fn pager(page_index: usize, total_pages: usize) -> Option<Pager> {
    if total_pages <= 1 {
        return None;
    }

    Some(Pager {
        first: PageNav::First.target(page_index, total_pages),
        previous: PageNav::Previous.target(page_index, total_pages),
        next: PageNav::Next.target(page_index, total_pages),
        last: PageNav::Last.target(page_index, total_pages),
    })
}

/// `thumbnails` line up with `page.items`.
pub fn render_home(
    albums: &[Album],
    album: Option<&Album>,
    page: &Page<'_, ImageSet>,
    total_items: usize,
    thumbnails: &[Option<impl AsRef<RgbaImage>>],
) -> Result<HomeView, ImageError> {
    let items = page
        .items
        .iter()
        .zip(thumbnails)
        .map(|(set, thumbnail)| {
            Ok(GridItem {
                key: set.key.clone(),
                frames: set.frames.len(),
                thumbnail: thumbnail
                    .as_ref()
                    .map(|image| data_uri(image.as_ref()))
                    .transpose()?,
            })
        })
        .collect::<Result<Vec<_>, ImageError>>()?;

    let showing = if page.items.is_empty() {
        (0, 0)
    } else {
        (page.start + 1, page.start + page.items.len())
    };

    Ok(HomeView {
        albums: albums.iter().map(entry).collect(),
        album: album.map(entry),
        page_index: page.page_index,
        total_pages: page.total_pages,
        total_items,
        showing,
        pager: pager(page.page_index, page.total_pages),
        items,
    })
}

pub fn render_viewer(
    album: &Album,
    set: &ImageSet,
    frames: &[Frame],
    frame_index: usize,
) -> Result<ViewerView, ImageError> {
    let total_frames = frames.len();
    let index = frame_index.min(total_frames.saturating_sub(1));
    let (width, height, frame) = match frames.get(index) {
        Some(current) => (current.width(), current.height(), data_uri(&current.image)?),
        None => (0, 0, String::new()),
    };

    Ok(ViewerView {
        album: entry(album),
        key: set.key.clone(),
        frame_index: index,
        total_frames,
        width,
        height,
        frame,
        previous_enabled: index > 0,
        next_enabled: index + 1 < total_frames,
        buttons: (0..total_frames)
            .map(|i| FrameButton {
                index: i,
                label: i + 1,
                current: i == index,
            })
            .collect(),
    })
}
