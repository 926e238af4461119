//! Provider listing endpoint

use axum::extract::State;

use super::state::AppState;
use super::types::{Json, ProviderInfo, ProvidersResponse};
use crate::domain::ProviderKind;

/// `GET /providers` lets a chat window disable unavailable providers up front
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .providers
        .statuses()
        .into_iter()
        .map(ProviderInfo::from)
        .collect();

    Json(ProvidersResponse {
        default_provider: ProviderKind::default().as_str().to_string(),
        providers,
    })
}
