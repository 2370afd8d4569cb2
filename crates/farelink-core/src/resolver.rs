//! # Card Resolver
//!
//! Maps a raw reader UID to exactly one card through an ordered cascade of
//! match rules, strict first, fuzzy last. The first rule that matches wins.
//!
//! ## Cascade
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  #  Rule               Probe                 Predicate        Status    │
//! │  ─  ─────────────────  ────────────────────  ───────────────  ───────── │
//! │  1  ExactRaw           raw                   uid == probe     any       │
//! │  2  Normalized         normalized            norm == probe    any       │
//! │  3  Stripped           stripped              strip == probe   any       │
//! │  4  PrefixOrExtension  normalized            prefix either    active    │
//! │  5  ReversedBytes      reverse(stripped)     prefix either    active    │
//! │  6  FourBytePrefix     stripped[..8]         prefix either    active    │
//! │                                                                         │
//! │  Tie-break inside a rule: active card, longest stored UID, lowest id.   │
//! │  Nothing matched ──► CardNotFound { suggested_uid: stripped }           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules 1-3 may return a blocked/expired/lost card so the caller can say
//! *why* the tap fails instead of a generic not-found. A retired card keeps
//! its row, so the replacement card for the same physical UID is usually
//! stored in another format: an inactive exact match is only reported when
//! no later exact rule finds an active card.
//!
//! The cascade is data, not control flow: a new reader quirk is a new entry
//! in `RULES`.
//!
//! ## Ambiguity
//! When several distinct cards qualify in the winning rule the longest stored
//! UID is still chosen, and the resolution is flagged `ambiguous` so the
//! caller can log it.

use serde::Serialize;
use std::cmp::Ordering;

use crate::error::{CoreError, CoreResult};
use crate::types::Card;
use crate::uid::{normalize_hex, strip_trailing_zeros, UidForms};

/// Default minimum number of hex characters for fuzzy (prefix) matching.
pub const DEFAULT_MIN_FUZZY_LEN: usize = 4;

// =============================================================================
// Options
// =============================================================================

/// Tunables for the fuzzy part of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Probes and stored UIDs shorter than this never take part in a prefix
    /// match. Exact rules are unaffected.
    pub min_fuzzy_len: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            min_fuzzy_len: DEFAULT_MIN_FUZZY_LEN,
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

/// Name of the cascade entry that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    ExactRaw,
    Normalized,
    Stripped,
    PrefixOrExtension,
    ReversedBytes,
    FourBytePrefix,
}

impl MatchRule {
    /// Whether the rule tolerates partial UIDs.
    pub fn is_fuzzy(&self) -> bool {
        matches!(
            self,
            MatchRule::PrefixOrExtension | MatchRule::ReversedBytes | MatchRule::FourBytePrefix
        )
    }
}

/// A stored card with its comparable forms precomputed.
#[derive(Debug)]
struct Candidate<'a> {
    card: &'a Card,
    normalized: String,
    stripped: String,
}

impl<'a> Candidate<'a> {
    fn new(card: &'a Card) -> Self {
        let normalized = normalize_hex(&card.uid);
        let stripped = strip_trailing_zeros(&normalized);
        Candidate {
            card,
            normalized,
            stripped,
        }
    }
}

/// One cascade entry: which input form to use and how to compare it.
struct Rule {
    kind: MatchRule,
    active_only: bool,
    probe: fn(&UidForms) -> Option<&str>,
    predicate: fn(&str, &Candidate<'_>, &ResolverOptions) -> bool,
}

/// The cascade, in evaluation order.
const RULES: &[Rule] = &[
    Rule {
        kind: MatchRule::ExactRaw,
        active_only: false,
        probe: probe_raw,
        predicate: same_raw,
    },
    Rule {
        kind: MatchRule::Normalized,
        active_only: false,
        probe: probe_normalized,
        predicate: same_normalized,
    },
    Rule {
        kind: MatchRule::Stripped,
        active_only: false,
        probe: probe_stripped,
        predicate: same_stripped,
    },
    Rule {
        kind: MatchRule::PrefixOrExtension,
        active_only: true,
        probe: probe_normalized,
        predicate: prefix_related,
    },
    Rule {
        kind: MatchRule::ReversedBytes,
        active_only: true,
        probe: probe_reversed,
        predicate: prefix_related,
    },
    Rule {
        kind: MatchRule::FourBytePrefix,
        active_only: true,
        probe: probe_four_bytes,
        predicate: prefix_related,
    },
];

fn probe_raw(forms: &UidForms) -> Option<&str> {
    Some(forms.raw.as_str())
}

fn probe_normalized(forms: &UidForms) -> Option<&str> {
    Some(forms.normalized.as_str())
}

fn probe_stripped(forms: &UidForms) -> Option<&str> {
    Some(forms.stripped.as_str())
}

fn probe_reversed(forms: &UidForms) -> Option<&str> {
    forms.reversed.as_deref()
}

fn probe_four_bytes(forms: &UidForms) -> Option<&str> {
    forms.four_byte_prefix.as_deref()
}

fn same_raw(probe: &str, candidate: &Candidate<'_>, _: &ResolverOptions) -> bool {
    candidate.card.uid == probe
}

fn same_normalized(probe: &str, candidate: &Candidate<'_>, _: &ResolverOptions) -> bool {
    candidate.normalized == probe
}

fn same_stripped(probe: &str, candidate: &Candidate<'_>, _: &ResolverOptions) -> bool {
    candidate.stripped == probe
}

/// Stored UID is a prefix of the probe, or the probe is a prefix of it.
fn prefix_related(probe: &str, candidate: &Candidate<'_>, options: &ResolverOptions) -> bool {
    let stored = candidate.normalized.as_str();
    if probe.len() < options.min_fuzzy_len || stored.len() < options.min_fuzzy_len {
        return false;
    }
    probe.starts_with(stored) || stored.starts_with(probe)
}

/// Active cards first, then longest stored UID, then lowest id.
fn specificity(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.card
        .status
        .is_active()
        .cmp(&a.card.status.is_active())
        .then_with(|| b.normalized.len().cmp(&a.normalized.len()))
        .then_with(|| a.card.id.cmp(&b.card.id))
}

// =============================================================================
// Resolver
// =============================================================================

/// Outcome of a successful cascade run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub card: Card,
    pub rule: MatchRule,
    /// More than one distinct card qualified under `rule`.
    pub ambiguous: bool,
    /// Number of cards that qualified under `rule`.
    pub contenders: usize,
}

/// Runs the match cascade over a candidate set supplied by storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardResolver {
    options: ResolverOptions,
}

impl CardResolver {
    pub fn new(options: ResolverOptions) -> Self {
        CardResolver { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolves a raw UID against `candidates`.
    ///
    /// `candidates` may be a superset of the plausible matches (for example
    /// every card whose normalized UID shares a prefix with any probe);
    /// every rule re-checks its own predicate.
    ///
    /// ## Errors
    /// `CoreError::CardNotFound` with the stripped form as `suggested_uid`.
    pub fn resolve(&self, forms: &UidForms, candidates: &[Card]) -> CoreResult<Resolution> {
        let prepared: Vec<Candidate<'_>> = candidates.iter().map(Candidate::new).collect();
        let mut inactive_exact: Option<Resolution> = None;

        for rule in RULES {
            if rule.kind.is_fuzzy() {
                if let Some(resolution) = inactive_exact.take() {
                    return Ok(resolution);
                }
            }

            let Some(probe) = (rule.probe)(forms) else {
                continue;
            };
            if probe.is_empty() {
                continue;
            }

            let mut matched: Vec<&Candidate<'_>> = prepared
                .iter()
                .filter(|c| !rule.active_only || c.card.status.is_active())
                .filter(|c| (rule.predicate)(probe, c, &self.options))
                .collect();

            if matched.is_empty() {
                continue;
            }

            matched.sort_by(|a, b| specificity(a, b));
            matched.dedup_by_key(|c| c.card.id);

            let contenders = matched.len();
            let resolution = Resolution {
                card: matched[0].card.clone(),
                rule: rule.kind,
                ambiguous: contenders > 1,
                contenders,
            };

            if !rule.kind.is_fuzzy() && !resolution.card.status.is_active() {
                inactive_exact.get_or_insert(resolution);
                continue;
            }
            return Ok(resolution);
        }

        if let Some(resolution) = inactive_exact {
            return Ok(resolution);
        }

        Err(CoreError::CardNotFound {
            suggested_uid: forms.suggested().to_string(),
        })
    }

    /// Convenience wrapper deriving the UID forms from the raw string.
    pub fn resolve_raw(&self, raw_uid: &str, candidates: &[Card]) -> CoreResult<Resolution> {
        self.resolve(&UidForms::derive(raw_uid), candidates)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::CardStatus;
    use chrono::Utc;

    fn card(id: i64, uid: &str, status: CardStatus) -> Card {
        let now = Utc::now();
        Card {
            id,
            uid: uid.to_string(),
            balance: Money::from_units(100),
            status,
            customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn resolver() -> CardResolver {
        CardResolver::default()
    }

    #[test]
    fn test_exact_raw_wins_first() {
        let cards = vec![card(1, "250E8B1B08", CardStatus::Active), card(2, "abc123", CardStatus::Active)];
        let res = resolver().resolve_raw("abc123", &cards).unwrap();
        assert_eq!(res.card.id, 2);
        assert_eq!(res.rule, MatchRule::ExactRaw);
    }

    #[test]
    fn test_case_and_separator_insensitive() {
        let cards = vec![card(1, "25:0E:8B:1B:08", CardStatus::Active)];
        let res = resolver().resolve_raw("250e8b1b08", &cards).unwrap();
        assert_eq!(res.card.id, 1);
        assert_eq!(res.rule, MatchRule::Normalized);
    }

    #[test]
    fn test_zero_padding_matches_stripped() {
        let cards = vec![card(1, "250E8B1B08", CardStatus::Blocked)];
        let res = resolver().resolve_raw("250E8B1B080000", &cards).unwrap();
        assert_eq!(res.rule, MatchRule::Stripped);
        assert_eq!(res.card.status, CardStatus::Blocked);
    }

    #[test]
    fn test_reversed_byte_order() {
        let cards = vec![card(1, "250E8B1B08", CardStatus::Active)];
        let res = resolver().resolve_raw("081B8B0E25", &cards).unwrap();
        assert_eq!(res.card.id, 1);
        assert_eq!(res.rule, MatchRule::ReversedBytes);
    }

    #[test]
    fn test_truncated_uid_matches_longer_stored() {
        let cards = vec![card(1, "250E8B1B0800", CardStatus::Active)];
        let res = resolver().resolve_raw("250E8B1B", &cards).unwrap();
        assert_eq!(res.card.id, 1);
        assert_eq!(res.rule, MatchRule::PrefixOrExtension);
    }

    #[test]
    fn test_four_byte_prefix_rule() {
        // Input diverges from the stored UID after the first 4 bytes.
        let cards = vec![card(1, "250E8B1BFFEE", CardStatus::Active)];
        let res = resolver().resolve_raw("250E8B1B0811", &cards).unwrap();
        assert_eq!(res.rule, MatchRule::FourBytePrefix);
    }

    #[test]
    fn test_fuzzy_ignores_inactive_cards() {
        let cards = vec![card(1, "250E8B1B0800", CardStatus::Lost)];
        let err = resolver().resolve_raw("250E8B1B", &cards).unwrap_err();
        match err {
            CoreError::CardNotFound { suggested_uid } => assert_eq!(suggested_uid, "250E8B1B"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_longest_stored_uid_wins() {
        let cards = vec![
            card(1, "250E8B", CardStatus::Active),
            card(2, "250E8B1B", CardStatus::Active),
        ];
        let res = resolver().resolve_raw("250E8B1B08", &cards).unwrap();
        assert_eq!(res.card.id, 2);
        assert!(res.ambiguous);
        assert_eq!(res.contenders, 2);
    }

    #[test]
    fn test_equal_length_tie_breaks_on_id() {
        let cards = vec![
            card(9, "250E8B1B08AA", CardStatus::Active),
            card(3, "250E8B1B08BB", CardStatus::Active),
        ];
        let res = resolver().resolve_raw("250E8B1B08", &cards).unwrap();
        assert_eq!(res.card.id, 3);
    }

    #[test]
    fn test_short_probe_never_fuzzy_matches() {
        let cards = vec![card(1, "25AB0000", CardStatus::Active)];
        let err = resolver().resolve_raw("25", &cards).unwrap_err();
        assert!(matches!(err, CoreError::CardNotFound { .. }));
    }

    #[test]
    fn test_not_found_suggests_stripped_form() {
        let err = resolver().resolve_raw("de:ad:be:ef:00", &[]).unwrap_err();
        match err {
            CoreError::CardNotFound { suggested_uid } => assert_eq!(suggested_uid, "DEADBEEF"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_active_card_beats_retired_twin() {
        let cards = vec![
            card(1, "25:0E:8B:1B:08", CardStatus::Lost),
            card(2, "250E8B1B08", CardStatus::Active),
        ];
        let res = resolver().resolve_raw("250e8b1b08", &cards).unwrap();
        assert_eq!(res.card.id, 2);
        assert_eq!(res.rule, MatchRule::Normalized);
    }

    #[test]
    fn test_exact_raw_on_retired_card_yields_to_active_normalized() {
        let cards = vec![
            card(1, "250E8B1B08", CardStatus::Lost),
            card(2, "25:0E:8B:1B:08", CardStatus::Active),
        ];
        let res = resolver().resolve_raw("250E8B1B08", &cards).unwrap();
        assert_eq!(res.card.id, 2);
        assert_eq!(res.rule, MatchRule::Normalized);
    }

    #[test]
    fn test_retired_exact_match_not_traded_for_fuzzy() {
        let cards = vec![
            card(1, "250E8B1B08", CardStatus::Expired),
            card(2, "250E8B1B08AA", CardStatus::Active),
        ];
        let res = resolver().resolve_raw("250E8B1B08", &cards).unwrap();
        assert_eq!(res.card.id, 1);
        assert_eq!(res.rule, MatchRule::ExactRaw);
    }
}
