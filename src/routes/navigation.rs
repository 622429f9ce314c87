//! Geocoding relay routes

use axum::extract::{Query, State};
use std::sync::Arc;

use crate::app::AppState;
use crate::domain::{ForwardQuery, ReverseQuery};
use crate::error::{ApiError, ApiResult};
use crate::services::RelayedResponse;

/// GET /api/navigation/reverse?lat=..&lng=..
pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReverseQuery>,
) -> ApiResult<RelayedResponse> {
    let coords = query.coordinates().map_err(ApiError::BadRequest)?;
    state.geocoder.reverse(coords).await
}

/// GET /api/navigation/forward?address=..
pub async fn forward(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ForwardQuery>,
) -> ApiResult<RelayedResponse> {
    let address = query.address().map_err(ApiError::BadRequest)?;
    state.geocoder.forward(address).await
}
