use std::sync::Arc;

use axum::{
    Json,
    extract::{State as AxumState, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::future::join_all;
use gallery::{
    image_set::ImageSet,
    library::Album,
    pagination::{PageNav, paginate, total_pages},
    view::{FrameNav, Page, Selection, ViewError, ViewState},
};
use image::RgbaImage;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    error::AppError,
    render::{View, render_home, render_viewer},
    session::{SessionId, clear_cookie, set_cookie},
    state::State,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
    /// Display name, only needed with several tenants.
    #[serde(default)]
    tenant: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SelectAlbum { album_id: String },
    FirstPage,
    PreviousPage,
    NextPage,
    LastPage,
    Open { key: String },
    PreviousFrame,
    NextFrame,
    JumpFrame { index: usize },
    Back,
}

fn payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(payload)| payload).map_err(|e| {
        warn!("Rejected payload: {e}");
        AppError::MalformedPayload
    })
}

fn tenant_id(view: &ViewState) -> Result<&str, AppError> {
    match (view.logged_in, view.tenant_id.as_deref()) {
        (true, Some(tenant_id)) => Ok(tenant_id),
        _ => Err(ViewError::LoginRequired.into()),
    }
}

fn load_session(state: &State, session: &SessionId) -> Result<(Uuid, ViewState), AppError> {
    let id = session.require()?;
    let view = state.sessions.get(id).ok_or(ViewError::LoginRequired)?;
    tenant_id(&view)?;

    Ok((id, view))
}

/// Selected album, or the most recent one when nothing is selected yet.
fn current_album<'a>(albums: &'a [Album], view: &ViewState) -> Result<Option<&'a Album>, AppError> {
    match view.album_id.as_deref() {
        Some(id) => albums
            .iter()
            .find(|album| album.id == id)
            .map(Some)
            .ok_or_else(|| AppError::UnknownAlbum(id.to_string())),
        None => Ok(albums.first()),
    }
}

async fn build_home(state: &State, view: &mut ViewState) -> Result<View, AppError> {
    let tenant_id = tenant_id(view)?.to_string();
    let albums = state.library.list_albums(state.tenant_root(&tenant_id)).await?;

    let Some(album) = current_album(&albums, view)? else {
        let page = paginate::<ImageSet>(&[], state.config.page_size, 0);
        let thumbnails: [Option<Arc<RgbaImage>>; 0] = [];

        return Ok(View::Home(render_home(&albums, None, &page, 0, &thumbnails)?));
    };

    let sets = state.library.list_image_sets(&tenant_id, album).await?;
    let pages = total_pages(sets.len(), state.config.page_size);
    view.page_index = view.page_index.min(pages.saturating_sub(1));

    let page = paginate(&sets, state.config.page_size, view.page_index);
    let thumbnails: Vec<Option<Arc<RgbaImage>>> =
        join_all(page.items.iter().map(|set| state.library.thumbnail(set)))
            .await
            .into_iter()
            .zip(page.items)
            .map(|(thumbnail, set)| {
                thumbnail
                    .map_err(|e| warn!("No thumbnail for {}: {e}", set.key))
                    .ok()
            })
            .collect();

    Ok(View::Home(render_home(
        &albums,
        Some(album),
        &page,
        sets.len(),
        &thumbnails,
    )?))
}

async fn build_viewer(state: &State, view: &mut ViewState) -> Result<View, AppError> {
    let tenant_id = tenant_id(view)?.to_string();
    let selection = view.selected.clone().ok_or(ViewError::NoSelection)?;

    let album = state
        .library
        .find_album(state.tenant_root(&tenant_id), &selection.album_id)
        .await?
        .ok_or_else(|| AppError::UnknownAlbum(selection.album_id.clone()))?;
    let set = state
        .library
        .find_image_set(&tenant_id, &album, &selection.set_key)
        .await?
        .ok_or_else(|| AppError::UnknownImage(selection.set_key.clone()))?;

    let frames = state.library.frames(&set).await?;
    view.frame_index = view.frame_index.min(frames.len().saturating_sub(1));

    Ok(View::Viewer(render_viewer(
        &album,
        &set,
        &frames,
        view.frame_index,
    )?))
}

async fn build_view(state: &State, view: &mut ViewState) -> Result<View, AppError> {
    match view.page {
        Page::Home => build_home(state, view).await,
        Page::Viewer => build_viewer(state, view).await,
    }
}

/// Total pages of the album the session is looking at.
async fn current_total_pages(state: &State, view: &ViewState) -> Result<usize, AppError> {
    let tenant_id = tenant_id(view)?;
    let albums = state.library.list_albums(state.tenant_root(tenant_id)).await?;

    let Some(album) = current_album(&albums, view)? else {
        return Ok(0);
    };
    let sets = state.library.list_image_sets(tenant_id, album).await?;

    Ok(total_pages(sets.len(), state.config.page_size))
}

async fn current_total_frames(state: &State, view: &ViewState) -> Result<usize, AppError> {
    let tenant_id = tenant_id(view)?;
    let selection = view.selected.as_ref().ok_or(ViewError::NoSelection)?;

    let album = state
        .library
        .find_album(state.tenant_root(tenant_id), &selection.album_id)
        .await?
        .ok_or_else(|| AppError::UnknownAlbum(selection.album_id.clone()))?;
    let set = state
        .library
        .find_image_set(tenant_id, &album, &selection.set_key)
        .await?
        .ok_or_else(|| AppError::UnknownImage(selection.set_key.clone()))?;

    Ok(state.library.frames(&set).await?.len())
}

async fn navigate_page(state: &State, view: &mut ViewState, nav: PageNav) -> Result<(), AppError> {
    let total = current_total_pages(state, view).await?;
    view.navigate_page(nav, total)?;

    Ok(())
}

async fn navigate_frame(state: &State, view: &mut ViewState, nav: FrameNav) -> Result<(), AppError> {
    if view.page != Page::Viewer {
        return Err(ViewError::NoSelection.into());
    }

    let total = current_total_frames(state, view).await?;
    view.navigate_frame(nav, total)?;

    Ok(())
}

async fn apply(state: &State, view: &mut ViewState, action: Action) -> Result<(), AppError> {
    match action {
        Action::SelectAlbum { album_id } => {
            let tenant_id = tenant_id(view)?;
            state
                .library
                .find_album(state.tenant_root(tenant_id), &album_id)
                .await?
                .ok_or_else(|| AppError::UnknownAlbum(album_id.clone()))?;

            view.select_album(&album_id)?;
        }
        Action::FirstPage => navigate_page(state, view, PageNav::First).await?,
        Action::PreviousPage => navigate_page(state, view, PageNav::Previous).await?,
        Action::NextPage => navigate_page(state, view, PageNav::Next).await?,
        Action::LastPage => navigate_page(state, view, PageNav::Last).await?,
        Action::Open { key } => {
            let tenant_id = tenant_id(view)?;
            let albums = state.library.list_albums(state.tenant_root(tenant_id)).await?;
            let album = current_album(&albums, view)?.ok_or(AppError::NoAlbums)?;

            if state
                .library
                .find_image_set(tenant_id, album, &key)
                .await?
                .is_none()
            {
                return Err(AppError::UnknownImage(key));
            }

            let selection = Selection {
                album_id: album.id.clone(),
                set_key: key,
            };
            view.open(selection)?;
        }
        Action::PreviousFrame => navigate_frame(state, view, FrameNav::Previous).await?,
        Action::NextFrame => navigate_frame(state, view, FrameNav::Next).await?,
        Action::JumpFrame { index } => navigate_frame(state, view, FrameNav::Jump(index)).await?,
        Action::Back => view.back()?,
    }

    Ok(())
}

pub async fn login_handler(
    AxumState(state): AxumState<Arc<State>>,
    previous: SessionId,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = payload(request)?;

    let mut view = ViewState::default();
    view.login(&state.credentials, &request.password, request.tenant.as_deref())?;

    if let Some(previous) = previous.0 {
        state.sessions.remove(previous);
    }
    let id = Uuid::new_v4();

    let rendered = build_view(&state, &mut view).await;
    state.sessions.put(id, view);
    info!("Session started, {} active", state.sessions.len());

    // Logged in even if the first render fails, so the cookie goes out either way.
    Ok(match rendered {
        Ok(rendered) => (set_cookie(id), Json(rendered)).into_response(),
        Err(e) => (set_cookie(id), e).into_response(),
    })
}

pub async fn logout_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: SessionId,
) -> impl IntoResponse {
    if let Some(id) = session.0 {
        state.sessions.remove(id);
    }

    (clear_cookie(), StatusCode::NO_CONTENT)
}

pub async fn view_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: SessionId,
) -> Result<Json<View>, AppError> {
    let (id, mut view) = load_session(&state, &session)?;

    let rendered = build_view(&state, &mut view).await?;
    state.sessions.put(id, view);

    Ok(Json(rendered))
}

/// Applies the action, then renders the resulting view.
/// A rejected action leaves the session untouched.
pub async fn action_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: SessionId,
    request: Result<Json<Action>, JsonRejection>,
) -> Result<Json<View>, AppError> {
    let (id, mut view) = load_session(&state, &session)?;
    let action = payload(request)?;

    apply(&state, &mut view, action).await?;

    let rendered = build_view(&state, &mut view).await?;
    state.sessions.put(id, view);

    Ok(Json(rendered))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
