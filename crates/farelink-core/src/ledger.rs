//! # Ledger Rules
//!
//! The pure half of the Fare Ledger: decides whether a debit or credit is
//! allowed and computes the resulting balances. Persisting the result is
//! `farelink-db`'s job and must happen atomically with the transaction row.
//!
//! ## Debit
//! ```text
//! Card { status, balance } + fare
//!      │
//!      ├── status != active        ──► CardNotActive { status }
//!      ├── fare <= 0               ──► InvalidAmount
//!      ├── balance < fare          ──► InsufficientBalance
//!      ▼
//! BalanceChange { before: balance, after: balance - fare }
//! ```

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Card, TransactionType};

/// Balances on either side of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceChange {
    pub kind: TransactionType,
    pub amount: Money,
    pub before: Money,
    pub after: Money,
}

fn ensure_active(card: &Card) -> CoreResult<()> {
    if card.status.is_active() {
        Ok(())
    } else {
        Err(CoreError::CardNotActive {
            card_id: card.id,
            status: card.status,
        })
    }
}

fn ensure_positive(amount: Money) -> CoreResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(CoreError::InvalidAmount {
            reason: format!("amount must be greater than 0, got {amount}"),
        })
    }
}

/// Validates a fare debit and computes the new balance.
///
/// ```rust
/// use farelink_core::ledger::plan_debit;
/// # use farelink_core::{Card, CardStatus, Money};
/// # let now = chrono::Utc::now();
/// # let card = Card { id: 1, uid: "04A1".into(), balance: Money::from_units(500),
/// #     status: CardStatus::Active, customer_id: None, created_at: now, updated_at: now };
/// let change = plan_debit(&card, Money::from_units(150)).unwrap();
/// assert_eq!(change.after, Money::from_units(350));
/// ```
pub fn plan_debit(card: &Card, fare: Money) -> CoreResult<BalanceChange> {
    ensure_active(card)?;
    ensure_positive(fare)?;

    if card.balance < fare {
        return Err(CoreError::InsufficientBalance {
            balance: card.balance,
            required: fare,
        });
    }

    let after = card
        .balance
        .checked_sub(fare)
        .ok_or_else(|| CoreError::InvalidAmount {
            reason: "balance arithmetic overflow".to_string(),
        })?;

    Ok(BalanceChange {
        kind: TransactionType::FarePayment,
        amount: fare,
        before: card.balance,
        after,
    })
}

/// Validates a top-up and computes the new balance.
///
/// There is no ceiling on the resulting balance.
pub fn plan_credit(card: &Card, amount: Money) -> CoreResult<BalanceChange> {
    ensure_active(card)?;
    ensure_positive(amount)?;

    let after = card
        .balance
        .checked_add(amount)
        .ok_or_else(|| CoreError::InvalidAmount {
            reason: "balance arithmetic overflow".to_string(),
        })?;

    Ok(BalanceChange {
        kind: TransactionType::TopUp,
        amount,
        before: card.balance,
        after,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
