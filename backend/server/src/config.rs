use std::{
    env,
    fmt::Display,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

use gallery::{
    credentials::CredentialStore,
    library::{AlbumLayout, LibraryOptions},
    storage::{MimeFilter, drive::DRIVE_API},
};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Drive,
    Local,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drive" | "gdrive" => Ok(StorageKind::Drive),
            "local" => Ok(StorageKind::Local),
            other => Err(format!("unknown storage '{other}', expected drive or local")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub page_size: usize,
    pub thumbnail_size: u32,
    pub storage: StorageKind,
    pub layout: AlbumLayout,
    pub image_filter: MimeFilter,
    pub local_root: PathBuf,
    pub cache_dir: PathBuf,
    pub root: String,
    pub drive_api: String,
    pub thumbnail_cache: usize,
    pub frame_cache: usize,
    /// Seconds a session may sit unused before it is dropped.
    pub session_idle: u64,
    pub secrets_dir: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let default_cache = env::temp_dir().join("album-cache");

        Self {
            port: try_load("RUST_PORT", "1111"),
            page_size: try_load::<usize>("GALLERY_PAGE_SIZE", "50").max(1),
            thumbnail_size: try_load("GALLERY_THUMBNAIL_SIZE", "300"),
            storage: try_load("GALLERY_STORAGE", "local"),
            layout: try_load("GALLERY_LAYOUT", "folders"),
            image_filter: try_load("GALLERY_IMAGE_FILTER", "image"),
            local_root: try_load("GALLERY_LOCAL_ROOT", "./albums"),
            cache_dir: try_load("GALLERY_CACHE_DIR", &default_cache.to_string_lossy()),
            root: try_load("GALLERY_ROOT", ""),
            drive_api: try_load("DRIVE_API_URL", DRIVE_API),
            thumbnail_cache: try_load("GALLERY_THUMBNAIL_CACHE", "1024"),
            frame_cache: try_load("GALLERY_FRAME_CACHE", "64"),
            session_idle: try_load("GALLERY_SESSION_IDLE_SECS", "86400"),
            secrets_dir: try_load("SECRETS_DIR", "/run/secrets"),
        }
    }

    pub fn library_options(&self) -> LibraryOptions {
        LibraryOptions {
            layout: self.layout,
            image_filter: self.image_filter,
            thumbnail_size: self.thumbnail_size,
            thumbnail_cache: self.thumbnail_cache,
            frame_cache: self.frame_cache,
            cache_dir: self.cache_dir.clone(),
        }
    }

    /// `GALLERY_TENANTS` (JSON map) wins over the single `GALLERY_PASSWORD`.
    pub fn credentials(&self) -> CredentialStore {
        if let Some(json) = read_optional_secret(&self.secrets_dir, "GALLERY_TENANTS") {
            return CredentialStore::from_json(&json)
                .map_err(|e| {
                    warn!("Invalid GALLERY_TENANTS: {e}");
                })
                .expect("Secrets misconfigured!");
        }

        CredentialStore::single(read_secret(&self.secrets_dir, "GALLERY_PASSWORD"), &self.root)
    }

    pub fn drive_token(&self) -> String {
        read_secret(&self.secrets_dir, "DRIVE_ACCESS_TOKEN")
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_optional_secret(dir: &Path, secret_name: &str) -> Option<String> {
    read_to_string(dir.join(secret_name))
        .map(|s| s.trim().to_string())
        .ok()
}

fn read_secret(dir: &Path, secret_name: &str) -> String {
    read_to_string(dir.join(secret_name))
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .expect("Secrets misconfigured!")
}
