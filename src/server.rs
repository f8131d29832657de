mod responses;
mod routes;

use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, TraceLayer};
use tracing::Level;

use crate::state::AppState;

pub use responses::ApiError;

/// The HTTP API. Resource routes live under `/api`.
pub fn router(state: AppState) -> Router {
    use axum::routing::{delete, get, post, put};

    let api = Router::new()
        .route("/hn/stories", get(routes::hn_stories))
        .route(
            "/rss/feeds",
            get(routes::list_feeds).post(routes::create_feed),
        )
        .route("/rss/feeds/import", post(routes::import_opml))
        .route("/rss/feeds/:id", delete(routes::delete_feed))
        .route("/rss/feeds/:id/refresh", post(routes::refresh_feed))
        .route("/rss/feeds/:id/folder", put(routes::move_feed))
        .route("/rss/items", get(routes::list_items))
        .route("/combined", get(routes::combined))
        .route(
            "/folders",
            get(routes::list_folders).post(routes::create_folder),
        )
        .route("/folders/:id", delete(routes::delete_folder));

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub struct Server {
    socket: TcpListener,
    app: Router,
}

impl Server {
    pub async fn new(bind_addr: &str, state: AppState) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)
            .await
            .with_context(|| anyhow!("could not bind to `{bind_addr}`"))?;

        Ok(Self {
            socket,
            app: router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        axum::serve(self.socket, self.app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .context("the HTTP server encountered a failure")
    }
}
