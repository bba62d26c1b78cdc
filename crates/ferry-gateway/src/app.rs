use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    admin_stats_handler, create_paste_handler, download_handler, fallback_handler,
    health_handler, raw_paste_handler, robots_handler, upload_handler, view_paste_handler,
};
use crate::ratelimit::rate_limit;
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(health_handler))
            .route("/robots.txt", get(robots_handler))
            .route(
                "/upload",
                post(upload_handler).layer(DefaultBodyLimit::max(state.max_upload_bytes())),
            )
            .route("/download/{code}", get(download_handler))
            .route(
                "/create_paste",
                post(create_paste_handler).layer(DefaultBodyLimit::max(state.max_upload_bytes())),
            )
            .route("/view/{code}", get(view_paste_handler))
            .route("/raw/{code}", get(raw_paste_handler))
            .route("/admin-stats", get(admin_stats_handler))
            .fallback(fallback_handler)
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
