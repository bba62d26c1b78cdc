use crate::error::{AppError, Result};
use crate::model::{CreatePasteRequest, CreatePasteResponse, PasteResponse};
use crate::state::AppState;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use ferry_core::{Code, ConsumeOutcome, ContentKind, ContentRecord, PasteDraft, ServedContent};
use tracing::error;

const PASTE_NOT_FOUND: &str = "Paste not found";
const PASTE_EXPIRED: &str = "Paste expired";

pub async fn create_paste_handler(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<CreatePasteResponse>> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(AppError::PayloadTooLarge);
        }
        Err(rejection) => return Err(AppError::BadRequest(rejection.body_text())),
    };
    // malformed bodies are treated as empty
    let request: CreatePasteRequest = serde_json::from_slice(&body).unwrap_or_default();

    let content = request.content.as_deref().unwrap_or_default().trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Content cannot be empty!".to_string()));
    }

    let created = state
        .depot()
        .create_paste(PasteDraft {
            content: content.to_string(),
            lang: request.lang.as_deref().unwrap_or_default().trim().to_string(),
            max_views: request.max_views(),
        })
        .await?;

    Ok(Json(created.into()))
}

enum Viewed {
    Text {
        record: ContentRecord,
        content: String,
        lang: String,
    },
    NotFound,
    Expired,
}

async fn consume_paste(state: &AppState, code: &str) -> Result<Viewed> {
    let Ok(code) = Code::parse(ContentKind::Paste, code) else {
        return Ok(Viewed::NotFound);
    };

    match state.depot().consume(ContentKind::Paste, &code).await? {
        ConsumeOutcome::NotFound => Ok(Viewed::NotFound),
        ConsumeOutcome::Expired => Ok(Viewed::Expired),
        ConsumeOutcome::Served {
            record,
            content: ServedContent::Text { content, lang },
        } => Ok(Viewed::Text {
            record,
            content,
            lang,
        }),
        ConsumeOutcome::Served { record, .. } => {
            error!(code = %record.code, "paste record served a file payload");
            Err(AppError::Internal("unexpected payload".to_string()))
        }
    }
}

/// Consumes one view and returns the paste as JSON. Expired and unknown
/// codes look the same to the viewer.
pub async fn view_paste_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PasteResponse>> {
    match consume_paste(&state, &code).await? {
        Viewed::Text {
            record,
            content,
            lang,
        } => Ok(Json(PasteResponse {
            remaining_views: record.remaining_uses(),
            code: record.code,
            content,
            lang,
        })),
        Viewed::NotFound | Viewed::Expired => Err(AppError::NotFound(PASTE_NOT_FOUND)),
    }
}

/// Consumes one view and returns the bare text.
pub async fn raw_paste_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    match consume_paste(&state, &code).await? {
        Viewed::Text { content, .. } => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )
            .into_response()),
        Viewed::NotFound => Err(AppError::NotFound(PASTE_NOT_FOUND)),
        Viewed::Expired => Err(AppError::Gone(PASTE_EXPIRED)),
    }
}
