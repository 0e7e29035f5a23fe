//! Credential persistence and login password encoding.

pub mod cipher;
pub mod store;

pub use cipher::PasswordEncoder;
pub use store::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore, mask_token,
};
