//! # Splitter
//!
//! Offline preparation of albums: every GIF becomes one PNG per frame plus a thumbnail, so the
//! server can page through frames without decoding whole animations.
//!
//! ```text
//! input/2024-01-01/anim.gif
//!   -> output/2024-01-01/anim_1.png .. anim_N.png
//!   -> output/2024-01-01/anim_th.png
//!   -> output/2024-01-01.zip        with --zip
//! ```
use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use gallery::decode::{self, Frame};
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub struct SplitOptions {
    pub thumbnail_size: u32,
    pub zip: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub albums: usize,
    pub gifs: usize,
    pub frames: usize,
}

fn is_gif(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

/// Direct subdirectories, ordered by name.
fn album_dirs(input: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for entry in fs::read_dir(input).with_context(|| format!("Reading {}", input.display()))? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_none_or(|name| name.starts_with('.'));

        if path.is_dir() && !hidden {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn gifs_in(album: &Path) -> Vec<PathBuf> {
    let mut gifs: Vec<PathBuf> = WalkDir::new(album)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_gif(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    gifs.sort();
    gifs
}

fn write_png(image: &image::RgbaImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Writing {}", path.display()))
}

/// Writes `<key>_<n>.png` (1-based) and `<key>_th.png`, returns the frame count.
pub fn split_gif(gif: &Path, out_dir: &Path, thumbnail_size: u32) -> Result<usize> {
    let key = gif
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("No usable name: {}", gif.display()))?;

    let data = fs::read(gif).with_context(|| format!("Reading {}", gif.display()))?;
    let frames: Vec<Frame> =
        decode::decode_frames(&data).with_context(|| format!("Decoding {}", gif.display()))?;

    for frame in &frames {
        write_png(&frame.image, &out_dir.join(format!("{key}_{}.png", frame.index + 1)))?;
    }

    if let Some(first) = frames.first() {
        let thumbnail = decode::thumbnail(&first.image, thumbnail_size);
        write_png(&thumbnail, &out_dir.join(format!("{key}_th.png")))?;
    }

    Ok(frames.len())
}

/// Packs the files of `dir` flat into `zip_path`.
pub fn zip_dir(dir: &Path, zip_path: &Path) -> Result<()> {
    let file = File::create(zip_path).with_context(|| format!("Creating {}", zip_path.display()))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        writer.start_file(name, options)?;
        io::copy(&mut File::open(&path)?, &mut writer)?;
    }

    writer.finish()?.into_inner()?;
    Ok(())
}

fn progress(len: usize, album: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );
    pb.set_message(album.to_string());

    Ok(pb)
}

/// Splits every album under `input` into `output`. A GIF that fails to decode is skipped.
pub fn split_albums(input: &Path, output: &Path, options: &SplitOptions) -> Result<SplitSummary> {
    let mut summary = SplitSummary::default();

    for album in album_dirs(input)? {
        let Some(name) = album.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let out_dir = output.join(name);
        fs::create_dir_all(&out_dir).with_context(|| format!("Creating {}", out_dir.display()))?;

        let gifs = gifs_in(&album);
        let pb = progress(gifs.len(), name)?;

        for gif in &gifs {
            match split_gif(gif, &out_dir, options.thumbnail_size) {
                Ok(frames) => {
                    summary.gifs += 1;
                    summary.frames += frames;
                }
                Err(e) => warn!("Skipping {}: {e:#}", gif.display()),
            }
            pb.inc(1);
        }
        pb.finish_with_message(format!("{name} done"));

        if options.zip {
            let zip_path = output.join(format!("{name}.zip"));
            zip_dir(&out_dir, &zip_path)?;
            info!("Packed {}", zip_path.display());
        }

        summary.albums += 1;
    }

    info!(
        "Split {} GIFs into {} frames across {} albums",
        summary.gifs, summary.frames, summary.albums
    );
    Ok(summary)
}
