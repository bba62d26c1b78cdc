use crate::error::AppError;
use crate::model::HealthResponse;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use jiff::Timestamp;

const ROBOTS_TXT: &str = "User-agent: *\n\
Disallow: /download/\n\
Disallow: /view/\n\
Disallow: /raw/\n\
Allow: /\n";

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        time_utc: Timestamp::now(),
    })
}

pub async fn robots_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], ROBOTS_TXT)
}

pub async fn fallback_handler() -> AppError {
    AppError::NotFound("Not found")
}
