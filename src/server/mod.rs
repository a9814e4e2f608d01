pub mod relay;
pub mod server;
