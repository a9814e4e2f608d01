pub mod api_client;
pub mod auth;

pub use api_client::{ApiClient, ApiClientBuilder};
