//! Card routes.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::UidResolution;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub uid: Option<String>,
}

/// `GET /api/cards/resolve?uid=`
///
/// Shows which card (and which rule) a reader UID would be charged to,
/// or the UID to register when nothing matches.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> ApiResult<Json<UidResolution>> {
    let Query(query) = query?;
    let resolution = state
        .fare
        .resolve_uid(query.uid.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(resolution))
}
