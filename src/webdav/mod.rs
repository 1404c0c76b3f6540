pub mod auth;
pub mod handler;
pub mod server;
pub mod xml_response;

pub use server::{build_router, run, AppState};
