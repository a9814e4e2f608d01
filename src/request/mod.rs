pub mod api_request;
pub mod api_response;
pub mod attempt;

pub use api_request::ApiRequest;
pub use api_response::{ApiResponse, Envelope};
pub use attempt::Attempt;
