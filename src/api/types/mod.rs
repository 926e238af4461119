//! Wire types of the relay API

pub mod error;
pub mod json;
pub mod relay;

pub use error::{ApiError, ApiErrorResponse, GENERATION_FAILED};
pub use json::Json;
pub use relay::{ProviderInfo, ProvidersResponse, RelayRequest};
