//! Infrastructure layer - Upstream providers, credentials, logging and metrics

pub mod credentials;
pub mod llm;
pub mod logging;
pub mod observability;
