//! History handler

use axum::{extract::State, Json};

use super::response::PesquisaResponse;
use crate::AppState;
use sourcefinder_common::errors::Result;

/// Every search, newest first, with nested sources
pub async fn list_historico(State(state): State<AppState>) -> Result<Json<Vec<PesquisaResponse>>> {
    let searches = state.store.list_searches().await?;

    Ok(Json(
        searches.into_iter().map(PesquisaResponse::from).collect(),
    ))
}
