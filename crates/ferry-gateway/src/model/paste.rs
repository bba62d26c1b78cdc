use crate::model::lenient_quota;
use ferry_core::{Code, Created, Quota};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /create_paste`. Every field is optional so a malformed
/// request degrades to "content cannot be empty" instead of a decode error.
#[derive(Debug, Default, Deserialize)]
pub struct CreatePasteRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    /// Accepted as a number or a numeric string.
    #[serde(default)]
    pub max_views: Option<Value>,
}

impl CreatePasteRequest {
    pub fn max_views(&self) -> Quota {
        match &self.max_views {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Quota::clamped)
                .unwrap_or_default(),
            Some(Value::String(s)) => lenient_quota(s),
            _ => Quota::default(),
        }
    }
}

#[derive(Serialize)]
pub struct CreatePasteResponse {
    pub message: &'static str,
    pub code: Code,
    pub max_views: u32,
    pub expires_in_hours: i64,
}

impl From<Created> for CreatePasteResponse {
    fn from(created: Created) -> Self {
        Self {
            message: "Paste created successfully!",
            expires_in_hours: created.expires_at.duration_since(created.created_at).as_hours(),
            max_views: created.max_uses.get(),
            code: created.code,
        }
    }
}

#[derive(Serialize)]
pub struct PasteResponse {
    pub code: Code,
    pub content: String,
    pub lang: String,
    pub remaining_views: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CreatePasteRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn max_views_accepts_numbers_and_strings() {
        assert_eq!(parse(r#"{"max_views": 3}"#).max_views().get(), 3);
        assert_eq!(parse(r#"{"max_views": "4"}"#).max_views().get(), 4);
        assert_eq!(parse(r#"{"max_views": 2.9}"#).max_views().get(), 2);
        assert_eq!(parse(r#"{"max_views": 500}"#).max_views().get(), 100);
        assert_eq!(parse(r#"{"max_views": "lots"}"#).max_views().get(), 1);
        assert_eq!(parse(r#"{"max_views": null}"#).max_views().get(), 1);
        assert_eq!(parse(r#"{}"#).max_views().get(), 1);
    }
}
