pub mod app;
pub mod app_state;
pub mod config;
pub mod drink;
pub mod drink_handlers;
pub mod permissions;
pub mod store;

pub use app::{build_router, setup};
pub use app_state::AppState;
pub use common_http_errors::ApiError;
