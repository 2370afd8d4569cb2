//! HTTP routes.
//!
//! ```text
//! POST /api/payments/fare              payments::fare
//! POST /api/payments/top-up            payments::top_up
//! GET  /api/payments/transactions      payments::transactions
//! GET  /api/cards/resolve              cards::resolve
//! POST /api/vehicles/{id}/location     vehicles::report_location
//! GET  /api/vehicles/{id}/location     vehicles::current_location
//! GET  /health                         health::health
//! ```

pub mod cards;
pub mod health;
pub mod payments;
pub mod vehicles;
