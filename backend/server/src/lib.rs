//! Documentation of a password-gated album viewer.
//!
//! Dated albums of GIF/PNG image sets, shown as a paged thumbnail grid and stepped through
//! frame by frame. The domain lives in the `gallery` crate; this crate is the HTTP surface.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks JSON to this server, every response is the full view to draw
//! - Albums come from Google Drive, a local directory, or one ZIP per day extracted on demand
//! - Session state is in memory, keyed by the `album_session` cookie
//! - Thumbnails and decoded frames are cached in memory, shared by all sessions
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path      | Body                                  |
//! |--------|-----------|---------------------------------------|
//! | POST   | `/login`  | `{ "password": "..", "tenant": ".." }` |
//! | POST   | `/logout` |                                       |
//! | GET    | `/view`   |                                       |
//! | POST   | `/action` | `{ "action": "next_frame" }`           |
//! | GET    | `/health` |                                       |
//!
//! Actions: `select_album { album_id }`, `first_page`, `previous_page`, `next_page`, `last_page`,
//! `open { key }`, `previous_frame`, `next_frame`, `jump_frame { index }`, `back`.
//!
//!
//!
//! # Notes
//!
//! ## Caching
//! Nothing is evicted by age. Thumbnails and frames are keyed by file id, name and version
//! (checksum or modified time), so a re-uploaded file gets a fresh entry while the old one ages
//! out of the LRU. Extracted archives stay on disk under `GALLERY_CACHE_DIR` across restarts.
//!
//! ## Sessions
//! A session unused for `GALLERY_SESSION_IDLE_SECS` (default one day) is dropped on the next
//! lookup or store, so logins without a logout do not pile up.
//!
//! ## Passwords
//! Plain string comparison against the secret file. Good enough for sharing family pictures,
//! nothing more.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! `````
//!
//! Run against a local folder.
//! ```sh
//! mkdir -p secrets && echo hunter2 > secrets/GALLERY_PASSWORD
//! SECRETS_DIR=secrets GALLERY_LOCAL_ROOT=./albums RUST_LOG=info cargo run -p album
//! `````
//!
//! Pre-split GIFs into frame PNGs.
//! ```sh
//! cargo run -p splitter -- ./raw ./albums --zip
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;

use routes::{action_handler, health_handler, login_handler, logout_handler, view_handler};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/view", get(view_handler))
        .route("/action", post(action_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor, path::Path};

    use axum::{
        body::{Body, to_bytes},
        http::{
            Request, StatusCode,
            header::{COOKIE, SET_COOKIE},
        },
        response::Response,
    };
    use gallery::{credentials::CredentialStore, storage::local::LocalStorage};
    use image::{ImageFormat, Rgba, RgbaImage};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, render::data_uri};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn write_png(path: &Path, color: Rgba<u8>) {
        let mut data = Cursor::new(Vec::new());
        RgbaImage::from_pixel(4, 4, color)
            .write_to(&mut data, ImageFormat::Png)
            .unwrap();
        fs::write(path, data.into_inner()).unwrap();
    }

    struct Fixture {
        app: Router,
        _albums: TempDir,
        _cache: TempDir,
    }

    fn fixture(page_size: usize) -> Fixture {
        let albums = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();

        let day = albums.path().join("2024-01-01");
        fs::create_dir(&day).unwrap();
        write_png(&day.join("pic_th.png"), GREEN);
        write_png(&day.join("pic_1.png"), RED);
        write_png(&day.join("pic_2.png"), BLUE);
        write_png(&day.join("solo.png"), RED);
        fs::create_dir(albums.path().join("2023-12-31")).unwrap();

        let config = Config {
            page_size,
            local_root: albums.path().to_path_buf(),
            cache_dir: cache.path().to_path_buf(),
            root: String::new(),
            ..Config::load()
        };
        let state = State::from_parts(
            config,
            CredentialStore::single("pw", ""),
            Arc::new(LocalStorage::new(albums.path())),
        );

        Fixture {
            app: app(state),
            _albums: albums,
            _cache: cache,
        }
    }

    fn post(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    fn get_view(cookie: &str) -> Request<Body> {
        Request::builder()
            .uri("/view")
            .header(COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn login(app: &Router) -> String {
        let response = send(app, post("/login", None, json!({ "password": "pw" }))).await;
        assert_eq!(response.status(), StatusCode::OK);

        response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    async fn action(app: &Router, cookie: &str, body: Value) -> Response {
        send(app, post("/action", Some(cookie), body)).await
    }

    #[tokio::test]
    async fn test_health() {
        let fixture = fixture(50);
        let response = send(
            &fixture.app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_required() {
        let fixture = fixture(50);

        let response = send(
            &fixture.app,
            Request::builder().uri("/view").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = action(
            &fixture.app,
            &format!("album_session={}", uuid::Uuid::new_v4()),
            json!({ "action": "next_page" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let fixture = fixture(50);

        let response = send(
            &fixture.app,
            post("/login", None, json!({ "password": "nope" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let fixture = fixture(50);

        let response = send(&fixture.app, post("/login", None, json!({ "pass": 1 }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let cookie = login(&fixture.app).await;
        let response = action(&fixture.app, &cookie, json!({ "action": "explode" })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_home_after_login() {
        let fixture = fixture(50);
        let cookie = login(&fixture.app).await;

        let view = json_body(send(&fixture.app, get_view(&cookie)).await).await;

        assert_eq!(view["page"], "home");
        assert_eq!(view["album"]["name"], "2024-01-01");
        assert_eq!(view["albums"][1]["name"], "2023-12-31");
        assert_eq!(view["total_items"], 2);
        assert_eq!(view["items"][0]["key"], "pic");
        assert_eq!(view["items"][0]["frames"], 2);
        assert!(
            view["items"][0]["thumbnail"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        assert!(view["pager"].is_null());
    }

    #[tokio::test]
    async fn test_paging_and_album_switch() {
        let fixture = fixture(1);
        let cookie = login(&fixture.app).await;

        let view = json_body(action(&fixture.app, &cookie, json!({ "action": "next_page" })).await).await;
        assert_eq!(view["page_index"], 1);
        assert_eq!(view["items"][0]["key"], "solo");
        assert_eq!(view["showing"], json!([2, 2]));

        let view = json_body(action(&fixture.app, &cookie, json!({ "action": "next_page" })).await).await;
        assert_eq!(view["page_index"], 1);

        let view = json_body(
            action(
                &fixture.app,
                &cookie,
                json!({ "action": "select_album", "album_id": "2023-12-31" }),
            )
            .await,
        )
        .await;
        assert_eq!(view["page_index"], 0);
        assert_eq!(view["total_items"], 0);

        let response = action(
            &fixture.app,
            &cookie,
            json!({ "action": "select_album", "album_id": "1999-01-01" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_open_and_step_frames() {
        let fixture = fixture(50);
        let cookie = login(&fixture.app).await;

        let view = json_body(
            action(&fixture.app, &cookie, json!({ "action": "open", "key": "pic" })).await,
        )
        .await;
        assert_eq!(view["page"], "viewer");
        assert_eq!(view["frame_index"], 0);
        assert_eq!(view["total_frames"], 2);
        assert_eq!(view["previous_enabled"], false);

        let view = json_body(action(&fixture.app, &cookie, json!({ "action": "next_frame" })).await).await;
        assert_eq!(view["frame_index"], 1);
        assert_eq!(view["next_enabled"], false);
        assert_eq!(
            view["frame"],
            data_uri(&RgbaImage::from_pixel(4, 4, BLUE)).unwrap()
        );

        let view = json_body(action(&fixture.app, &cookie, json!({ "action": "next_frame" })).await).await;
        assert_eq!(view["frame_index"], 1);

        let response = action(
            &fixture.app,
            &cookie,
            json!({ "action": "jump_frame", "index": 9 }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let view = json_body(send(&fixture.app, get_view(&cookie)).await).await;
        assert_eq!(view["frame_index"], 1);

        let view = json_body(action(&fixture.app, &cookie, json!({ "action": "back" })).await).await;
        assert_eq!(view["page"], "home");

        let response = action(&fixture.app, &cookie, json!({ "action": "previous_frame" })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let view = json_body(
            action(&fixture.app, &cookie, json!({ "action": "open", "key": "pic" })).await,
        )
        .await;
        assert_eq!(view["frame_index"], 0);
    }

    #[tokio::test]
    async fn test_frame_action_without_selection() {
        let fixture = fixture(50);
        let cookie = login(&fixture.app).await;

        let response = action(&fixture.app, &cookie, json!({ "action": "next_frame" })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = action(&fixture.app, &cookie, json!({ "action": "open", "key": "nope" })).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let fixture = fixture(50);
        let cookie = login(&fixture.app).await;

        let response = send(&fixture.app, post("/logout", Some(&cookie), json!({}))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&fixture.app, get_view(&cookie)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
