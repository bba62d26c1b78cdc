use crate::error::{AppError, Result};
use crate::model::{lenient_quota, UploadResponse};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use ferry_core::{
    Code, ConsumeOutcome, ContentKind, DepotError, FileUpload, Quota, ServedContent, StagedUpload,
};
use tokio_util::io::ReaderStream;
use tracing::error;

const INVALID_CODE: &str = "Invalid or expired code!";
const FILE_EXPIRED: &str = "This file has expired.";

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(err.body_text())
    }
}

pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut file: Option<(String, StagedUpload)> = None;
    let mut agreed_terms = false;
    let mut max_downloads = Quota::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                // spooled to disk chunk by chunk; removed again if the form is rejected
                let mut staged = state.depot().stage_file().await?;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    staged.write_chunk(&chunk).await.map_err(DepotError::from)?;
                }
                staged.finish().await.map_err(DepotError::from)?;
                file = Some((file_name, staged));
            }
            "agreed_terms" => {
                let value = field.text().await.map_err(multipart_error)?;
                agreed_terms = value.trim().eq_ignore_ascii_case("true");
            }
            "max_downloads" => {
                let value = field.text().await.map_err(multipart_error)?;
                max_downloads = lenient_quota(&value);
            }
            _ => {}
        }
    }

    let Some((original_name, staged)) = file.filter(|(name, _)| !name.is_empty()) else {
        return Err(AppError::BadRequest("No file selected!".to_string()));
    };
    if !agreed_terms {
        return Err(AppError::BadRequest(
            "Please accept the Terms first!".to_string(),
        ));
    }

    let created = state
        .depot()
        .create_file(FileUpload {
            original_name,
            staged,
            max_downloads,
        })
        .await?;

    Ok(Json(created.into()))
}

pub async fn download_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let Ok(code) = Code::parse(ContentKind::File, &code) else {
        return Err(AppError::NotFound(INVALID_CODE));
    };

    match state.depot().consume(ContentKind::File, &code).await? {
        ConsumeOutcome::NotFound => Err(AppError::NotFound(INVALID_CODE)),
        ConsumeOutcome::Expired => Err(AppError::Gone(FILE_EXPIRED)),
        ConsumeOutcome::Served {
            content:
                ServedContent::File {
                    file,
                    file_name,
                    size,
                },
            ..
        } => Response::builder()
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, size)
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            )
            .body(Body::from_stream(ReaderStream::new(file)))
            .map_err(|e| AppError::Internal(e.to_string())),
        ConsumeOutcome::Served { record, .. } => {
            error!(code = %record.code, "file record served a text payload");
            Err(AppError::Internal("unexpected payload".to_string()))
        }
    }
}
