//! # Farelink Fare API
//!
//! HTTP server that validators post card taps to.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Fare API Server                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Payments      │  │  Cards         │  │  Vehicles                  ││
//! │  │                │  │                │  │                            ││
//! │  │ • fare (tap)   │  │ • resolve      │  │ • report location          ││
//! │  │ • top-up       │  │   (dry run)    │  │ • current location         ││
//! │  │ • transactions │  │                │  │                            ││
//! │  └───────┬────────┘  └───────┬────────┘  └─────────────┬──────────────┘│
//! │          │                   │                         │               │
//! │          ▼                   ▼                         │               │
//! │  ┌─────────────────────────────────────┐               │               │
//! │  │  FareService (services/)            │               │               │
//! │  │  validate → vehicle → resolve →     │               │               │
//! │  │  debit → location → commit          │               │               │
//! │  └──────────────────┬──────────────────┘               │               │
//! │                     ▼                                  ▼               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  farelink-db (SQLite, BEGIN IMMEDIATE write transactions)        │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `FARELINK_HTTP_PORT` - HTTP port (default: 8080)
//! - `FARELINK_BIND_ADDR` - Interface to bind (default: 0.0.0.0)
//! - `FARELINK_DATABASE_PATH` - SQLite file (default: ./data/farelink.db)
//! - `FARELINK_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `FARELINK_MIN_FUZZY_UID_LEN` - Shortest UID for prefix matching (default: 4)
//! - `FARELINK_MAX_FARE` - Largest single fare (default: unbounded)
//! - `RUST_LOG` - Log filter (default: `info,farelink=debug`)

pub mod config;
pub mod error;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use services::FareService;

use farelink_db::Database;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub fare: FareService,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let fare = FareService::new(db.clone(), config.resolver_options(), config.fare_options());
        AppState { db, fare, config }
    }
}

/// Builds the router with every route and the request trace layer.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/payments/fare", post(routes::payments::fare))
        .route("/api/payments/top-up", post(routes::payments::top_up))
        .route("/api/payments/transactions", get(routes::payments::transactions))
        .route("/api/cards/resolve", get(routes::cards::resolve))
        .route(
            "/api/vehicles/{id}/location",
            get(routes::vehicles::current_location).post(routes::vehicles::report_location),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
