pub mod settings;
pub mod types;
pub mod proc_loader;
pub mod proc_validator;
