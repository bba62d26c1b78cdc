//! HTTP surface of the Ferry content store.
//!
//! Routes uploads, downloads and pastes onto a [`ferry_core::Depot`] and
//! limits request rates per client.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod ratelimit;
pub mod state;

pub use app::App;
pub use error::{AppError, Result};
pub use ratelimit::{spawn_pruner, RateLimitConfig, RateLimiter};
pub use state::AppState;
