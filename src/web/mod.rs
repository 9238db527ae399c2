pub mod admin;
pub mod auth;
pub mod messages;
pub mod public;
pub mod responses;
pub mod router;
pub mod state;
pub mod uploads;
pub mod walls;

pub use responses::{ApiError, ApiResult, json_error, store_error};
pub use state::AppState;
