//! Service layer.
//!
//! Handlers stay thin; anything that changes a balance goes through here.

pub mod fare_service;

pub use fare_service::{FareService, PaymentReceipt, TopUpRequest, UidResolution};
