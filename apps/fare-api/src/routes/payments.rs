//! Payment routes: fare taps, top-ups and the ledger listing.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::Serialize;

use crate::error::ApiResult;
use crate::services::{PaymentReceipt, TopUpRequest};
use crate::AppState;
use farelink_core::{TapRequest, Transaction};
use farelink_db::TransactionFilter;

/// `POST /api/payments/fare`
pub async fn fare(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TapRequest>, JsonRejection>,
) -> ApiResult<Json<PaymentReceipt>> {
    let Json(request) = payload?;
    let receipt = state.fare.tap(request).await?;
    Ok(Json(receipt))
}

/// `POST /api/payments/top-up`
pub async fn top_up(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TopUpRequest>, JsonRejection>,
) -> ApiResult<Json<PaymentReceipt>> {
    let Json(request) = payload?;
    let receipt = state.fare.top_up(request).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
    pub count: usize,
}

/// `GET /api/payments/transactions?card_id=&vehicle_id=&limit=`
///
/// Newest first.
pub async fn transactions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TransactionFilter>, QueryRejection>,
) -> ApiResult<Json<TransactionList>> {
    let Query(filter) = query?;
    let transactions = state.db.transactions().list(&filter).await?;
    Ok(Json(TransactionList {
        count: transactions.len(),
        transactions,
    }))
}
