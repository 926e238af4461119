//! Provider credential sources

mod env_provider;

pub use env_provider::{EnvCredentialProvider, EnvMapping};
