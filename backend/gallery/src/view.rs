//! # View State
//!
//! Per-session navigation position, mutated only through the transitions below.
//!
//! ```text
//! home --open(selection)--> viewer      frame_index = 0
//! viewer --back--> home
//! viewer --previous/next/jump--> viewer  frame_index within [0, total_frames - 1]
//! ```
//!
//! Every transition other than [`ViewState::login`] requires `logged_in`.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{credentials::CredentialStore, pagination::PageNav};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ViewError {
    #[error("Login required")]
    LoginRequired,

    #[error("Wrong password")]
    InvalidCredentials,

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("No image selected")]
    NoSelection,

    #[error("Frame {index} out of range ({total} frames)")]
    FrameOutOfRange { index: usize, total: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Home,
    Viewer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub album_id: String,
    pub set_key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameNav {
    Previous,
    Next,
    Jump(usize),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub page: Page,
    pub page_index: usize,
    pub album_id: Option<String>,
    pub selected: Option<Selection>,
    pub frame_index: usize,
    pub logged_in: bool,
    pub tenant_id: Option<String>,
}

impl ViewState {
    fn require_login(&self) -> Result<(), ViewError> {
        if self.logged_in {
            Ok(())
        } else {
            Err(ViewError::LoginRequired)
        }
    }

    /// `tenant_name` is the display name; required when the store holds several tenants.
    pub fn login(
        &mut self,
        store: &CredentialStore,
        password: &str,
        tenant_name: Option<&str>,
    ) -> Result<(), ViewError> {
        let tenant = match tenant_name {
            Some(name) => store
                .resolve(name)
                .ok_or_else(|| ViewError::UnknownTenant(name.to_string()))?,
            None => store.sole_tenant().ok_or(ViewError::InvalidCredentials)?,
        };

        if !store.verify(password, Some(&tenant.id)) {
            return Err(ViewError::InvalidCredentials);
        }

        info!("Tenant {} logged in", tenant.id);
        *self = ViewState {
            logged_in: true,
            tenant_id: Some(tenant.id.clone()),
            ..ViewState::default()
        };

        Ok(())
    }

    pub fn logout(&mut self) {
        *self = ViewState::default();
    }

    /// Date selector. Returns to the first page of the grid.
    pub fn select_album(&mut self, album_id: &str) -> Result<(), ViewError> {
        self.require_login()?;

        self.album_id = Some(album_id.to_string());
        self.page_index = 0;
        self.page = Page::Home;

        Ok(())
    }

    /// `false` when the button is disabled and nothing changed.
    pub fn navigate_page(&mut self, nav: PageNav, total_pages: usize) -> Result<bool, ViewError> {
        self.require_login()?;

        match nav.target(self.page_index, total_pages) {
            Some(target) if target != self.page_index => {
                self.page_index = target;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn open(&mut self, selection: Selection) -> Result<(), ViewError> {
        self.require_login()?;

        self.album_id = Some(selection.album_id.clone());
        self.selected = Some(selection);
        self.frame_index = 0;
        self.page = Page::Viewer;

        Ok(())
    }

    /// Previous at the first frame and next at the last are no-ops.
    /// Only the viewer has a current frame.
    pub fn navigate_frame(&mut self, nav: FrameNav, total_frames: usize) -> Result<bool, ViewError> {
        self.require_login()?;

        if self.page != Page::Viewer || self.selected.is_none() {
            return Err(ViewError::NoSelection);
        }

        let target = match nav {
            FrameNav::Previous => self.frame_index.checked_sub(1),
            FrameNav::Next => Some(self.frame_index + 1).filter(|next| *next < total_frames),
            FrameNav::Jump(index) if index < total_frames => Some(index),
            FrameNav::Jump(index) => {
                return Err(ViewError::FrameOutOfRange {
                    index,
                    total: total_frames,
                });
            }
        };

        match target {
            Some(target) if target != self.frame_index => {
                self.frame_index = target;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn back(&mut self) -> Result<(), ViewError> {
        self.require_login()?;

        self.page = Page::Home;
        self.frame_index = 0;

        Ok(())
    }
}
