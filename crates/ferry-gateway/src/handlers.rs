mod admin;
mod file;
mod health;
mod paste;

pub use admin::admin_stats_handler;
pub use file::{download_handler, upload_handler};
pub use health::{fallback_handler, health_handler, robots_handler};
pub use paste::{create_paste_handler, raw_paste_handler, view_paste_handler};
