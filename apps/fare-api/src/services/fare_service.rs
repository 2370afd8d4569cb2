//! Fare service: the tap orchestrator.
//!
//! Runs one tap from validated request to committed ledger row.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TapRequest::validate                        ──► MissingFields / 400    │
//! │  BEGIN IMMEDIATE ─────────────────────────────────────────────────────┐ │
//! │  │ vehicle::fetch_by_id + accepts_fares      ──► VehicleNotFound      │ │
//! │  │ card::fetch_candidates + CardResolver     ──► CardNotFound         │ │
//! │  │ ledger::debit (plan + CAS + ledger row)   ──► NotActive / Balance  │ │
//! │  │ SAVEPOINT tap_location (best-effort)      ──► warn, fare kept      │ │
//! │  COMMIT ◄─────────────────────────────────────────────────────────────┘ │
//! │  Any error before COMMIT ──► ROLLBACK, nothing visible                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ApiResult, ErrorCode};
use farelink_core::validation::{validate_amount, validate_id};
use farelink_core::{
    CardResolver, CardStatus, CoreError, FareOptions, FareTap, MatchRule, Money, ResolverOptions,
    TapRequest, TapStage, Transaction, UidForms,
};
use farelink_db::repository::{card as cards, location, vehicle as vehicles};
use farelink_db::{ledger, Database, LedgerEntry, LedgerReceipt, WriteTransaction};

// =============================================================================
// DTOs
// =============================================================================

/// Successful fare or top-up.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub success: bool,
    pub transaction: Transaction,
    pub new_balance: Money,
}

impl From<LedgerReceipt> for PaymentReceipt {
    fn from(receipt: LedgerReceipt) -> Self {
        PaymentReceipt {
            success: true,
            new_balance: receipt.change.after,
            transaction: receipt.transaction,
        }
    }
}

/// Direct (agent / cash) credit of a card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub card_id: Option<i64>,
    pub amount: Option<Money>,
}

/// Dry-run result of the resolver cascade.
#[derive(Debug, Clone, Serialize)]
pub struct UidResolution {
    pub card_id: i64,
    pub card_uid: String,
    pub status: CardStatus,
    pub rule: MatchRule,
    pub ambiguous: bool,
    pub contenders: usize,
    pub normalized_uid: String,
}

// =============================================================================
// Service
// =============================================================================

/// Fare tap orchestrator plus the other balance-changing operations.
#[derive(Debug, Clone)]
pub struct FareService {
    db: Database,
    resolver: CardResolver,
    options: FareOptions,
}

impl FareService {
    pub fn new(db: Database, resolver_options: ResolverOptions, options: FareOptions) -> Self {
        FareService {
            db,
            resolver: CardResolver::new(resolver_options),
            options,
        }
    }

    /// Charges one tap.
    ///
    /// ## Errors
    /// Every rejection leaves the card and the ledger untouched. A storage
    /// failure rolls the whole tap back and is reported as
    /// `PERSISTENCE_FAILURE`.
    pub async fn tap(&self, request: TapRequest) -> ApiResult<PaymentReceipt> {
        let tap_ref = Uuid::new_v4();
        let span = info_span!(
            "fare_tap",
            tap_ref = %tap_ref,
            vehicle_id = ?request.vehicle_id
        );

        async move {
            let tap = request.validate(&self.options, Utc::now()).map_err(|err| {
                warn!(stage = %TapStage::Received, error = %err, "Tap rejected");
                err
            })?;
            debug!(stage = %TapStage::Received, uid = %tap.card_uid, fare = %tap.fare, "Tap accepted for processing");

            self.process(tap).await
        }
        .instrument(span)
        .await
    }

    async fn process(&self, tap: FareTap) -> ApiResult<PaymentReceipt> {
        let mut tx = self.db.begin_write().await?;
        let mut stage = TapStage::Received;

        let outcome = self.charge(tx.conn()?, &tap, &mut stage).await;
        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                if err.code == ErrorCode::PersistenceFailure || stage.requires_rollback() {
                    error!(stage = %stage, code = ?err.code, "Tap failed, rolled back");
                } else {
                    warn!(stage = %stage, code = ?err.code, message = %err.message, "Tap rejected");
                }
                return Err(err);
            }
        };

        if let Some(fix) = tap.location {
            self.record_location(&mut tx, tap.vehicle_id, fix).await;
        }

        tx.commit().await?;
        debug!(stage = %TapStage::Committed, "Stage reached");

        info!(
            card_id = receipt.transaction.card_id,
            fare = %receipt.change.amount,
            new_balance = %receipt.change.after,
            reference = %receipt.transaction.reference,
            "Fare tap committed"
        );

        Ok(receipt.into())
    }

    /// Vehicle check, card resolution and debit, all on the write
    /// transaction's connection.
    async fn charge(
        &self,
        conn: &mut SqliteConnection,
        tap: &FareTap,
        stage: &mut TapStage,
    ) -> ApiResult<LedgerReceipt> {
        let vehicle = vehicles::fetch_by_id(&mut *conn, tap.vehicle_id)
            .await?
            .ok_or_else(|| CoreError::VehicleNotFound {
                vehicle_id: tap.vehicle_id,
                reason: "unknown vehicle".to_string(),
            })?;
        if !vehicle.accepts_fares() {
            return Err(CoreError::VehicleNotFound {
                vehicle_id: vehicle.id,
                reason: vehicle.status.to_string(),
            }
            .into());
        }
        advance(stage, TapStage::VehicleValidated);

        let forms = UidForms::derive(&tap.card_uid);
        let candidates = cards::fetch_candidates(&mut *conn, &forms).await?;
        let resolution = self.resolver.resolve(&forms, &candidates)?;
        if resolution.ambiguous {
            warn!(
                card_id = resolution.card.id,
                rule = ?resolution.rule,
                contenders = resolution.contenders,
                uid = %forms.raw,
                "Ambiguous UID match, most specific stored UID chosen"
            );
        }
        debug!(card_id = resolution.card.id, rule = ?resolution.rule, "Card resolved");
        advance(stage, TapStage::CardResolved);

        let entry = LedgerEntry {
            vehicle_id: Some(vehicle.id),
            device_timestamp: tap.device_timestamp,
            location: tap.location,
        };
        match ledger::debit(&mut *conn, &resolution.card, tap.fare, &entry).await {
            Ok(receipt) => {
                advance(stage, TapStage::FundsChecked);
                advance(stage, TapStage::Debited);
                Ok(receipt)
            }
            Err(err) => {
                if !err.is_rejection() {
                    *stage = TapStage::FundsChecked;
                }
                Err(err.into())
            }
        }
    }

    /// Best-effort: a failure is logged and leaves the debit in place.
    async fn record_location(&self, tx: &mut WriteTransaction, vehicle_id: i64, fix: farelink_core::GeoFix) {
        let recorded_at = Utc::now();
        let outcome = tx
            .savepoint("tap_location", move |conn| {
                Box::pin(location::record(conn, vehicle_id, fix, recorded_at))
            })
            .await;

        match outcome {
            Ok(sample) => {
                debug!(stage = %TapStage::LocationRecorded, sample_id = sample.id, "Stage reached");
            }
            Err(err) => {
                warn!(error = %err, "Location recording failed, fare kept");
            }
        }
    }

    /// Credits a card by id through the ledger.
    pub async fn top_up(&self, request: TopUpRequest) -> ApiResult<PaymentReceipt> {
        let mut missing = Vec::new();
        if request.card_id.is_none() {
            missing.push("card_id");
        }
        if request.amount.is_none() {
            missing.push("amount");
        }
        let (Some(card_id), Some(amount)) = (request.card_id, request.amount) else {
            return Err(CoreError::missing(missing).into());
        };
        let card_id = validate_id("card_id", card_id)?;
        let amount = validate_amount("amount", amount, None)?;

        let mut tx = self.db.begin_write().await?;
        let outcome = credit(tx.conn()?, card_id, amount).await;
        match outcome {
            Ok(receipt) => {
                tx.commit().await?;
                info!(
                    card_id,
                    amount = %amount,
                    new_balance = %receipt.change.after,
                    reference = %receipt.transaction.reference,
                    "Top-up committed"
                );
                Ok(receipt.into())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                warn!(card_id, code = ?err.code, "Top-up rejected");
                Err(err)
            }
        }
    }

    /// Runs the resolver cascade without charging anything.
    pub async fn resolve_uid(&self, raw_uid: &str) -> ApiResult<UidResolution> {
        let raw_uid = raw_uid.trim();
        if raw_uid.is_empty() {
            return Err(CoreError::missing(["uid"]).into());
        }

        let forms = UidForms::derive(raw_uid);
        let candidates = self.db.cards().find_candidates(&forms).await?;
        let resolution = self.resolver.resolve(&forms, &candidates)?;

        Ok(UidResolution {
            card_id: resolution.card.id,
            card_uid: resolution.card.uid,
            status: resolution.card.status,
            rule: resolution.rule,
            ambiguous: resolution.ambiguous,
            contenders: resolution.contenders,
            normalized_uid: forms.normalized,
        })
    }
}

async fn credit(conn: &mut SqliteConnection, card_id: i64, amount: Money) -> ApiResult<LedgerReceipt> {
    let card = cards::fetch_by_id(&mut *conn, card_id)
        .await?
        .ok_or_else(|| farelink_db::DbError::not_found("Card", card_id))?;

    let entry = LedgerEntry {
        vehicle_id: None,
        device_timestamp: Utc::now(),
        location: None,
    };
    Ok(ledger::credit(conn, &card, amount, &entry).await?)
}

fn advance(stage: &mut TapStage, next: TapStage) {
    *stage = next;
    debug!(stage = %next, "Stage reached");
}

// =============================================================================
// Unit Tests
// =============================================================================
