pub mod dto;
pub mod handlers;
pub mod worker;

pub use handlers::AppState;
