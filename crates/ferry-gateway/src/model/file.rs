use ferry_core::{Code, Created};
use serde::Serialize;

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub code: Code,
    pub max_downloads: u32,
    pub expires_in_hours: i64,
}

impl From<Created> for UploadResponse {
    fn from(created: Created) -> Self {
        Self {
            message: "File uploaded successfully!",
            expires_in_hours: created.expires_at.duration_since(created.created_at).as_hours(),
            max_downloads: created.max_uses.get(),
            code: created.code,
        }
    }
}
