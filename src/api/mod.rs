//! HTTP surface for the interactive assistant (feature `api`).

pub mod models;
pub mod server;

pub use models::ApiResponse;
pub use server::start_http_server;
