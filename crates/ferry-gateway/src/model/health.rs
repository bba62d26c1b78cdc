use jiff::Timestamp;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time_utc: Timestamp,
}
