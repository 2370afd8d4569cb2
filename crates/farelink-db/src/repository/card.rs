//! # Card Repository
//!
//! Database operations for NFC cards, including the candidate search that
//! feeds the Card Resolver.
//!
//! ## UID Columns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  card_uid        "25:0e:8b:1b:08"   as captured, never rewritten        │
//! │  uid_normalized  "250E8B1B08"       hex-only uppercase projection       │
//! │                                                                         │
//! │  register() / update_uid() keep uid_normalized in step with card_uid.   │
//! │                                                                         │
//! │  Candidate search (one query per probe):                                │
//! │    uid_normalized = probe                   exact                       │
//! │    probe LIKE uid_normalized || '%'         stored is a prefix          │
//! │    uid_normalized LIKE probe || '%'         probe is a prefix           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The search deliberately over-fetches; the resolver re-checks every rule.
//!
//! Functions taking `&mut SqliteConnection` run on the caller's connection
//! so they can take part in a [`WriteTransaction`](crate::WriteTransaction).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use farelink_core::uid::normalize_hex;
use farelink_core::{Card, CardStatus, Money, UidForms};

const CARD_COLUMNS: &str =
    "id, card_uid, balance, status, customer_id, created_at, updated_at";

// =============================================================================
// Records
// =============================================================================

/// Row shape of `cards`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CardRecord {
    id: i64,
    card_uid: String,
    balance: String,
    status: CardStatus,
    customer_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CardRecord> for Card {
    type Error = DbError;

    fn try_from(record: CardRecord) -> DbResult<Self> {
        let balance: Money = record
            .balance
            .parse()
            .map_err(|e| DbError::decode("cards.balance", e))?;

        Ok(Card {
            id: record.id,
            uid: record.card_uid,
            balance,
            status: record.status,
            customer_id: record.customer_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn into_cards(records: Vec<CardRecord>) -> DbResult<Vec<Card>> {
    records.into_iter().map(Card::try_from).collect()
}

/// Input for registering a card.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub uid: String,
    pub balance: Money,
    pub status: CardStatus,
    pub customer_id: Option<i64>,
}

impl NewCard {
    /// An active card with the given opening balance.
    pub fn active(uid: impl Into<String>, balance: Money) -> Self {
        NewCard {
            uid: uid.into(),
            balance,
            status: CardStatus::Active,
            customer_id: None,
        }
    }
}

// =============================================================================
// Connection-level queries
// =============================================================================

/// Gets a card by id on the given connection.
pub async fn fetch_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Card>> {
    let record = sqlx::query_as::<_, CardRecord>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    record.map(Card::try_from).transpose()
}

/// Cards whose stored UID equals `raw` exactly (no normalization).
pub async fn fetch_by_exact_uid(conn: &mut SqliteConnection, raw: &str) -> DbResult<Vec<Card>> {
    let records = sqlx::query_as::<_, CardRecord>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE card_uid = ?1 ORDER BY id"
    ))
    .bind(raw)
    .fetch_all(&mut *conn)
    .await?;

    into_cards(records)
}

/// Cards whose normalized UID equals `pattern` or is prefix-related to it.
///
/// `pattern` must already be normalized (hex-only uppercase).
pub async fn fetch_by_normalized_uid_pattern(
    conn: &mut SqliteConnection,
    pattern: &str,
    active_only: bool,
) -> DbResult<Vec<Card>> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let records = sqlx::query_as::<_, CardRecord>(&format!(
        r#"
        SELECT {CARD_COLUMNS}
        FROM cards
        WHERE uid_normalized <> ''
          AND (
                uid_normalized = ?1
             OR ?1 LIKE uid_normalized || '%'
             OR uid_normalized LIKE ?1 || '%'
          )
          AND (?2 = 0 OR status = 'active')
        ORDER BY length(uid_normalized) DESC, id
        "#
    ))
    .bind(pattern)
    .bind(active_only)
    .fetch_all(&mut *conn)
    .await?;

    into_cards(records)
}

/// Loads every card any resolver rule could match for `forms`.
///
/// Exact-raw and normalized/stripped probes include inactive cards; the
/// reversed and 4-byte probes only feed fuzzy rules and are limited to
/// active cards.
pub async fn fetch_candidates(conn: &mut SqliteConnection, forms: &UidForms) -> DbResult<Vec<Card>> {
    let mut cards = fetch_by_exact_uid(conn, &forms.raw).await?;

    for probe in forms.probes() {
        let active_only = probe != forms.normalized && probe != forms.stripped;
        for card in fetch_by_normalized_uid_pattern(conn, probe, active_only).await? {
            if !cards.iter().any(|c| c.id == card.id) {
                cards.push(card);
            }
        }
    }

    debug!(raw = %forms.raw, candidates = cards.len(), "Loaded resolver candidates");
    Ok(cards)
}

/// Writes a new balance if the stored balance still equals `expected`.
///
/// ## Errors
/// `DbError::ConcurrentModification` if the row changed since it was read,
/// `DbError::NotFound` if the card does not exist.
pub async fn compare_and_set_balance(
    conn: &mut SqliteConnection,
    card_id: i64,
    expected: Money,
    new_balance: Money,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cards
        SET balance = ?3, updated_at = ?4
        WHERE id = ?1 AND balance = ?2
        "#,
    )
    .bind(card_id)
    .bind(expected.to_storage())
    .bind(new_balance.to_storage())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM cards WHERE id = ?1")
            .bind(card_id)
            .fetch_optional(&mut *conn)
            .await?;

        return Err(match exists {
            Some(_) => DbError::ConcurrentModification {
                entity: "Card".to_string(),
                id: card_id,
            },
            None => DbError::not_found("Card", card_id),
        });
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for card database operations.
#[derive(Debug, Clone)]
pub struct CardRepository {
    pool: SqlitePool,
}

impl CardRepository {
    /// Creates a new CardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CardRepository { pool }
    }

    /// Registers a card. The UID is stored as given.
    pub async fn register(&self, card: &NewCard) -> DbResult<Card> {
        let now = Utc::now();
        let normalized = normalize_hex(&card.uid);

        debug!(uid = %card.uid, normalized = %normalized, "Registering card");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cards (
                card_uid, uid_normalized, balance, status, customer_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id
            "#,
        )
        .bind(&card.uid)
        .bind(&normalized)
        .bind(card.balance.to_storage())
        .bind(card.status)
        .bind(card.customer_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, card.uid.clone()),
            other => other,
        })?;

        Ok(Card {
            id,
            uid: card.uid.clone(),
            balance: card.balance,
            status: card.status,
            customer_id: card.customer_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a card by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Card>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Cards whose stored UID equals `raw` exactly.
    pub async fn find_by_exact_uid(&self, raw: &str) -> DbResult<Vec<Card>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_exact_uid(&mut conn, raw).await
    }

    /// Cards whose normalized UID equals or is prefix-related to `pattern`.
    pub async fn find_by_normalized_uid_pattern(
        &self,
        pattern: &str,
        active_only: bool,
    ) -> DbResult<Vec<Card>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_normalized_uid_pattern(&mut conn, pattern, active_only).await
    }

    /// Every card a resolver rule could match for `forms`.
    pub async fn find_candidates(&self, forms: &UidForms) -> DbResult<Vec<Card>> {
        let mut conn = self.pool.acquire().await?;
        fetch_candidates(&mut conn, forms).await
    }

    /// Replaces a card's UID (administrative re-registration).
    pub async fn update_uid(&self, id: i64, uid: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cards
            SET card_uid = ?2, uid_normalized = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(uid)
        .bind(normalize_hex(uid))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Card", id));
        }
        Ok(())
    }

    /// Number of registered cards.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Changes a card's lifecycle status.
    pub async fn set_status(&self, id: i64, status: CardStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE cards SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Card", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
