mod admin;
mod file;
mod health;
mod paste;

pub use admin::StatsQuery;
pub use file::UploadResponse;
pub use health::HealthResponse;
pub use paste::{CreatePasteRequest, CreatePasteResponse, PasteResponse};

use ferry_core::Quota;

/// Reads a requested quota the forgiving way: anything that is not an
/// integer falls back to the default of one use, the rest is clamped.
pub fn lenient_quota(raw: &str) -> Quota {
    raw.trim()
        .parse::<i64>()
        .map(Quota::clamped)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_quota_clamps_and_defaults() {
        assert_eq!(lenient_quota("5").get(), 5);
        assert_eq!(lenient_quota(" 7 ").get(), 7);
        assert_eq!(lenient_quota("0").get(), 1);
        assert_eq!(lenient_quota("-3").get(), 1);
        assert_eq!(lenient_quota("1000").get(), 100);
        assert_eq!(lenient_quota("many").get(), 1);
        assert_eq!(lenient_quota("").get(), 1);
    }
}
