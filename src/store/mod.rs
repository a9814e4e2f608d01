pub mod credentials;
pub mod credential_store;
pub mod persistence;
pub mod grant;

pub use credential_store::CredentialStore;
pub use credentials::CredentialPair;
