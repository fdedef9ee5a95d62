pub mod dto;
pub mod handlers;
pub mod version_provider;

pub use handlers::AppState;
