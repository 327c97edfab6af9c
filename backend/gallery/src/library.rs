//! # Library
//!
//! Albums and image sets for one tenant root, with decoded artifacts memoized.
//!
//! ## Layouts
//! - [`AlbumLayout::Folders`]: `<root>/<date>/` folders holding the image files
//! - [`AlbumLayout::Archives`]: `<root>/<date>.zip` archives, extracted on first view
//!
//! ## Caches
//! - Thumbnails: thumbnail source file key to resized bitmap
//! - Frames: the set's frame file keys to the decoded frame list
//!
//! Decoding and resizing run on the blocking pool.
use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

use bytes::Bytes;
use image::RgbaImage;
use tracing::debug;

use crate::{
    cache::{CacheKey, MemoCache},
    decode::{self, Frame},
    error::{GalleryError, StorageError},
    image_set::{ImageSet, group_image_sets},
    storage::{
        FileRef, MimeFilter, StorageGateway, archive::ArchiveCache, local::LocalStorage,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    /// Set in the archive layout.
    pub archive: Option<FileRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlbumLayout {
    Folders,
    Archives,
}

impl FromStr for AlbumLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "folders" | "folder" => Ok(AlbumLayout::Folders),
            "archives" | "archive" | "zip" => Ok(AlbumLayout::Archives),
            other => Err(format!("unknown album layout '{other}', expected folders or archives")),
        }
    }
}

impl fmt::Display for AlbumLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlbumLayout::Folders => write!(f, "folders"),
            AlbumLayout::Archives => write!(f, "archives"),
        }
    }
}

enum Layout {
    Folders,
    Archives {
        cache: ArchiveCache,
        extracted: LocalStorage,
    },
}

pub struct LibraryOptions {
    pub layout: AlbumLayout,
    pub image_filter: MimeFilter,
    pub thumbnail_size: u32,
    /// `0` means unbounded.
    pub thumbnail_cache: usize,
    /// `0` means unbounded.
    pub frame_cache: usize,
    /// Where archives get extracted.
    pub cache_dir: PathBuf,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            layout: AlbumLayout::Folders,
            image_filter: MimeFilter::AnyImage,
            thumbnail_size: decode::THUMBNAIL_SIZE,
            thumbnail_cache: 1024,
            frame_cache: 64,
            cache_dir: std::env::temp_dir().join("album-cache"),
        }
    }
}

pub struct Library {
    gateway: Arc<dyn StorageGateway>,
    layout: Layout,
    image_filter: MimeFilter,
    thumbnail_size: u32,
    thumbnails: MemoCache<CacheKey, Arc<RgbaImage>>,
    frames: MemoCache<Vec<CacheKey>, Arc<Vec<Frame>>>,
}

impl Library {
    pub fn new(gateway: Arc<dyn StorageGateway>, options: LibraryOptions) -> Self {
        let layout = match options.layout {
            AlbumLayout::Folders => Layout::Folders,
            AlbumLayout::Archives => Layout::Archives {
                cache: ArchiveCache::new(&options.cache_dir),
                extracted: LocalStorage::new(&options.cache_dir),
            },
        };

        Self {
            gateway,
            layout,
            image_filter: options.image_filter,
            thumbnail_size: options.thumbnail_size,
            thumbnails: MemoCache::with_capacity(options.thumbnail_cache),
            frames: MemoCache::with_capacity(options.frame_cache),
        }
    }

    /// Most recent date first.
    pub async fn list_albums(&self, root: &str) -> Result<Vec<Album>, GalleryError> {
        let mut albums: Vec<Album> = match &self.layout {
            Layout::Folders => self
                .gateway
                .list_folders(root)
                .await?
                .into_iter()
                .map(|folder| Album {
                    id: folder.id,
                    name: folder.name,
                    archive: None,
                })
                .collect(),
            Layout::Archives { .. } => self
                .gateway
                .list_files(root, MimeFilter::Zip)
                .await?
                .into_iter()
                .map(|file| Album {
                    id: file.id.clone(),
                    name: file.stem().to_string(),
                    archive: Some(file),
                })
                .collect(),
        };

        albums.sort_by(|a, b| b.name.cmp(&a.name).then_with(|| a.id.cmp(&b.id)));
        Ok(albums)
    }

    pub async fn find_album(&self, root: &str, album_id: &str) -> Result<Option<Album>, GalleryError> {
        Ok(self
            .list_albums(root)
            .await?
            .into_iter()
            .find(|album| album.id == album_id))
    }

    async fn list_album_files(&self, tenant_id: &str, album: &Album) -> Result<Vec<FileRef>, GalleryError> {
        match (&self.layout, &album.archive) {
            (Layout::Archives { cache, extracted }, Some(archive)) => {
                let dir = cache
                    .fetch_archive_and_extract(self.gateway.as_ref(), tenant_id, &album.name, archive)
                    .await?;
                let parent = extracted.id_for(&dir)?;

                Ok(extracted.list_files_recursive(&parent, self.image_filter).await?)
            }
            (Layout::Archives { .. }, None) => {
                Err(StorageError::NotFound(format!("archive for album {}", album.name)).into())
            }
            (Layout::Folders, _) => Ok(self.gateway.list_files(&album.id, self.image_filter).await?),
        }
    }

    /// Sets ordered by key.
    pub async fn list_image_sets(&self, tenant_id: &str, album: &Album) -> Result<Vec<ImageSet>, GalleryError> {
        let files = self.list_album_files(tenant_id, album).await?;
        Ok(group_image_sets(files))
    }

    pub async fn find_image_set(
        &self,
        tenant_id: &str,
        album: &Album,
        key: &str,
    ) -> Result<Option<ImageSet>, GalleryError> {
        Ok(self
            .list_image_sets(tenant_id, album)
            .await?
            .into_iter()
            .find(|set| set.key == key))
    }

    /// Image files only. In the archive layout they live in the extraction directory.
    pub async fn fetch_bytes(&self, file: &FileRef) -> Result<Bytes, StorageError> {
        match &self.layout {
            Layout::Folders => self.gateway.fetch_bytes(&file.id).await,
            Layout::Archives { extracted, .. } => extracted.fetch_bytes(&file.id).await,
        }
    }

    pub async fn thumbnail(&self, set: &ImageSet) -> Result<Arc<RgbaImage>, GalleryError> {
        let Some(source) = set.thumbnail_source() else {
            return Err(StorageError::NotFound(format!("thumbnail for {}", set.key)).into());
        };
        let size = self.thumbnail_size;

        self.thumbnails
            .get_or_try_insert_with(CacheKey::from(source), || async move {
                let data = self.fetch_bytes(source).await?;
                debug!("Building thumbnail from {}", source.name);

                let image = tokio::task::spawn_blocking(move || {
                    decode::decode_first(&data).map(|first| decode::thumbnail(&first, size))
                })
                .await??;

                Ok::<_, GalleryError>(Arc::new(image))
            })
            .await
    }

    /// Every frame of the set, in order, decoded once per unique set of file versions.
    pub async fn frames(&self, set: &ImageSet) -> Result<Arc<Vec<Frame>>, GalleryError> {
        let key: Vec<CacheKey> = set.frames.iter().map(CacheKey::from).collect();

        self.frames
            .get_or_try_insert_with(key, || async move {
                let mut lists = Vec::with_capacity(set.frames.len());

                for file in &set.frames {
                    let data = self.fetch_bytes(file).await?;
                    debug!("Decoding frames of {}", file.name);

                    let frames =
                        tokio::task::spawn_blocking(move || decode::decode_frames(&data)).await??;
                    lists.push(frames);
                }

                Ok::<_, GalleryError>(Arc::new(decode::concat_frames(lists)))
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        decode::tests::{BLUE, GREEN, RED, gif, png},
        storage::{Folder, mime_from_name},
    };

    /// In-memory storage: folder id to files, file id to content.
    #[derive(Default)]
    pub(crate) struct MemoryStorage {
        pub folders: HashMap<String, Vec<Folder>>,
        pub files: HashMap<String, Vec<FileRef>>,
        pub content: HashMap<String, Vec<u8>>,
        pub fetches: AtomicUsize,
    }

    impl MemoryStorage {
        pub(crate) fn add_folder(&mut self, parent: &str, id: &str, name: &str) {
            self.folders.entry(parent.to_string()).or_default().push(Folder {
                id: id.to_string(),
                name: name.to_string(),
            });
        }

        pub(crate) fn add_file(&mut self, parent: &str, name: &str, data: Vec<u8>) {
            let id = format!("{parent}/{name}");
            self.files.entry(parent.to_string()).or_default().push(FileRef {
                id: id.clone(),
                name: name.to_string(),
                mime_type: mime_from_name(name).to_string(),
                modified_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                checksum: None,
            });
            self.content.insert(id, data);
        }
    }

    #[async_trait]
    impl StorageGateway for MemoryStorage {
        async fn list_folders(&self, parent: &str) -> Result<Vec<Folder>, StorageError> {
            Ok(self.folders.get(parent).cloned().unwrap_or_default())
        }

        async fn list_files(
            &self,
            parent: &str,
            filter: MimeFilter,
        ) -> Result<Vec<FileRef>, StorageError> {
            let mut files: Vec<FileRef> = self
                .files
                .get(parent)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|file| filter.matches(&file.mime_type))
                .collect();
            files.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(files)
        }

        async fn fetch_bytes(&self, file_id: &str) -> Result<Bytes, StorageError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.content
                .get(file_id)
                .map(|data| Bytes::from(data.clone()))
                .ok_or_else(|| StorageError::NotFound(file_id.to_string()))
        }
    }

    fn storage() -> Arc<MemoryStorage> {
        let mut storage = MemoryStorage::default();
        storage.add_folder("root", "f-old", "2023-12-31");
        storage.add_folder("root", "f-new", "2024-01-01");
        storage.add_file("f-new", "pic_th.png", png(8, 8, GREEN));
        storage.add_file("f-new", "pic_2.png", png(8, 8, BLUE));
        storage.add_file("f-new", "pic_1.png", png(8, 8, RED));
        storage.add_file("f-new", "anim.gif", gif(&[RED, GREEN, BLUE]));
        storage.add_file("f-new", "broken.gif", b"GIF89a-broken".to_vec());
        storage.add_file("f-new", "notes.txt", b"hello".to_vec());
        Arc::new(storage)
    }

    fn library(storage: Arc<MemoryStorage>) -> Library {
        Library::new(storage, LibraryOptions::default())
    }

    #[tokio::test]
    async fn test_albums_most_recent_first() {
        let library = library(storage());

        let albums = library.list_albums("root").await.unwrap();
        let names: Vec<&str> = albums.iter().map(|a| a.name.as_str()).collect();

        assert_eq!(names, ["2024-01-01", "2023-12-31"]);
        assert!(library.find_album("root", "f-old").await.unwrap().is_some());
        assert!(library.find_album("root", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_image_sets_grouped() {
        let library = library(storage());
        let album = library.find_album("root", "f-new").await.unwrap().unwrap();

        let sets = library.list_image_sets("default", &album).await.unwrap();
        let keys: Vec<&str> = sets.iter().map(|s| s.key.as_str()).collect();

        assert_eq!(keys, ["anim", "broken", "pic"]);
        assert_eq!(sets[2].frames.len(), 2);
    }

    #[tokio::test]
    async fn test_frames_in_order_and_cached() {
        let storage = storage();
        let library = library(storage.clone());
        let album = library.find_album("root", "f-new").await.unwrap().unwrap();
        let set = library
            .find_image_set("default", &album, "pic")
            .await
            .unwrap()
            .unwrap();

        let first = library.frames(&set).await.unwrap();
        let second = library.frames(&set).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(*first[0].image.get_pixel(0, 0), RED);
        assert_eq!(*first[1].image.get_pixel(0, 0), BLUE);
        assert_eq!(first, second);
        assert_eq!(storage.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gif_set_frames() {
        let library = library(storage());
        let album = library.find_album("root", "f-new").await.unwrap().unwrap();
        let set = library
            .find_image_set("default", &album, "anim")
            .await
            .unwrap()
            .unwrap();

        let frames = library.frames(&set).await.unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(*frames[2].image.get_pixel(0, 0), BLUE);
    }

    #[tokio::test]
    async fn test_thumbnail_cached_and_resized() {
        let storage = storage();
        let library = library(storage.clone());
        let album = library.find_album("root", "f-new").await.unwrap().unwrap();
        let set = library
            .find_image_set("default", &album, "pic")
            .await
            .unwrap()
            .unwrap();

        let first = library.thumbnail(&set).await.unwrap();
        let second = library.thumbnail(&set).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((first.width(), first.height()), (300, 300));
        let pixel = first.get_pixel(150, 150);
        assert!(pixel[1] > 200 && pixel[0] < 50, "{pixel:?}");
        assert_eq!(storage.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_is_an_error() {
        let library = library(storage());
        let album = library.find_album("root", "f-new").await.unwrap().unwrap();
        let set = library
            .find_image_set("default", &album, "broken")
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            library.frames(&set).await,
            Err(GalleryError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_gif_only_filter() {
        let library = Library::new(
            storage(),
            LibraryOptions {
                image_filter: MimeFilter::Gif,
                ..LibraryOptions::default()
            },
        );
        let album = library.find_album("root", "f-new").await.unwrap().unwrap();

        let sets = library.list_image_sets("default", &album).await.unwrap();
        let keys: Vec<&str> = sets.iter().map(|s| s.key.as_str()).collect();

        assert_eq!(keys, ["anim", "broken"]);
    }

    #[tokio::test]
    async fn test_numbered_gifs_are_separate_sets() {
        let mut storage = MemoryStorage::default();
        storage.add_folder("root", "f-day", "2024-02-02");
        storage.add_file("f-day", "round_1.gif", gif(&[RED, GREEN]));
        storage.add_file("f-day", "round_2.gif", gif(&[BLUE, RED]));
        let library = Library::new(
            Arc::new(storage),
            LibraryOptions {
                image_filter: MimeFilter::Gif,
                ..LibraryOptions::default()
            },
        );
        let album = library.find_album("root", "f-day").await.unwrap().unwrap();

        let sets = library.list_image_sets("default", &album).await.unwrap();
        let keys: Vec<&str> = sets.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["round_1", "round_2"]);

        let first = library.frames(&sets[0]).await.unwrap();
        let second = library.frames(&sets[1]).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(*second[0].image.get_pixel(0, 0), BLUE);
    }

    #[tokio::test]
    async fn test_archive_layout() {
        use std::io::{Cursor, Write};

        use zip::{ZipWriter, write::SimpleFileOptions};

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in [
            ("pic_1.png", png(4, 4, RED)),
            ("pic_2.png", png(4, 4, BLUE)),
            ("pic_th.png", png(4, 4, GREEN)),
        ] {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(&data).unwrap();
        }
        let archive = writer.finish().unwrap().into_inner();

        let mut storage = MemoryStorage::default();
        storage.add_file("root", "2024-01-01.zip", archive);
        storage.add_file("root", "2023-12-31.zip", Vec::new());
        let storage = Arc::new(storage);

        let cache = tempfile::tempdir().unwrap();
        let library = Library::new(
            storage.clone(),
            LibraryOptions {
                layout: AlbumLayout::Archives,
                cache_dir: cache.path().to_path_buf(),
                ..LibraryOptions::default()
            },
        );

        let albums = library.list_albums("root").await.unwrap();
        assert_eq!(albums[0].name, "2024-01-01");
        assert_eq!(albums[1].name, "2023-12-31");

        let sets = library.list_image_sets("t1", &albums[0]).await.unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].frames.len(), 2);

        let frames = library.frames(&sets[0]).await.unwrap();
        assert_eq!(*frames[1].image.get_pixel(0, 0), BLUE);

        library.list_image_sets("t1", &albums[0]).await.unwrap();
        assert_eq!(storage.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("folders".parse::<AlbumLayout>().unwrap(), AlbumLayout::Folders);
        assert_eq!("ZIP".parse::<AlbumLayout>().unwrap(), AlbumLayout::Archives);
        assert!("cloud".parse::<AlbumLayout>().is_err());
    }
}
