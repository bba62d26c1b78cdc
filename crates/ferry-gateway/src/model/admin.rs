use serde::Deserialize;

#[derive(Deserialize)]
pub struct StatsQuery {
    pub key: Option<String>,
}
