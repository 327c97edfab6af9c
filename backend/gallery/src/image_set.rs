//! # Image Sets
//!
//! Groups an album's files into animations by file stem.
//!
//! - `<key>_th`: thumbnail, never a frame
//! - `<key>_<N>`: frame `N`, ordered numerically so `a_2` comes before `a_10`
//! - anything else: a set of its own whose single file holds every frame (a GIF)
//!
//! GIFs always form their own set, whatever their stem: `round_1.gif` and `round_2.gif` are two
//! animations, not two frames of `round`.
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::LazyLock,
};

use regex::Regex;

use crate::storage::{FileRef, GIF_MIME};

static MEMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<key>.+)_(?P<tag>th|\d+)$").unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSet {
    pub key: String,
    pub thumbnail: Option<FileRef>,
    pub frames: Vec<FileRef>,
}

impl ImageSet {
    /// Explicit thumbnail, else the first frame file.
    pub fn thumbnail_source(&self) -> Option<&FileRef> {
        self.thumbnail.as_ref().or_else(|| self.frames.first())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Member {
    Thumbnail,
    Frame(u64),
    Whole,
}

fn classify(stem: &str) -> (&str, Member) {
    let Some(captures) = MEMBER.captures(stem) else {
        return (stem, Member::Whole);
    };

    let (Some(key), Some(tag)) = (captures.name("key"), captures.name("tag")) else {
        return (stem, Member::Whole);
    };

    match tag.as_str() {
        "th" => (key.as_str(), Member::Thumbnail),
        digits => match digits.parse() {
            Ok(number) => (key.as_str(), Member::Frame(number)),
            // Too many digits to be a frame number.
            Err(_) => (stem, Member::Whole),
        },
    }
}

/// Numeric frame order, falling back to the full name for ties and whole files.
fn frame_order(a: &(Option<u64>, FileRef), b: &(Option<u64>, FileRef)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name))
}

/// Sets ordered by key.
pub fn group_image_sets(files: impl IntoIterator<Item = FileRef>) -> Vec<ImageSet> {
    let mut thumbnails: BTreeMap<String, FileRef> = BTreeMap::new();
    let mut members: BTreeMap<String, Vec<(Option<u64>, FileRef)>> = BTreeMap::new();

    for file in files {
        let stem = file.stem().to_string();
        let (key, member) = if file.mime_type == GIF_MIME {
            (stem.as_str(), Member::Whole)
        } else {
            classify(&stem)
        };
        let key = key.to_string();

        match member {
            Member::Thumbnail => {
                thumbnails.entry(key).or_insert(file);
            }
            Member::Frame(number) => members.entry(key).or_default().push((Some(number), file)),
            Member::Whole => members.entry(key).or_default().push((None, file)),
        }
    }

    // A thumbnail with no frames is not an animation.
    members
        .into_iter()
        .map(|(key, mut frames)| {
            frames.sort_by(frame_order);

            ImageSet {
                thumbnail: thumbnails.remove(&key),
                frames: frames.into_iter().map(|(_, file)| file).collect(),
                key,
            }
        })
        .collect()
}
