//! Card Kernel — Table Invariants
//!
//! Pure analyses over a loaded card table. Nothing here mutates or
//! persists; the repair passes decide what to do with the findings.
//!
//! Invariants of a healthy table:
//!   - every flag vector is all-false or its project's template
//!   - every identity has one record per project, agreeing on numbers
//!   - texts are trimmed and agree across siblings
//!   - card numbers cover 1..=max without holes

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::card::Card;
use crate::error::CardError;
use crate::project::SIBLINGS_PER_CARD;

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Records sharing a card identity, keyed in identity order.
/// Members keep their table order.
pub fn group_by_identity(cards: &[Card]) -> BTreeMap<&str, Vec<&Card>> {
    let mut groups: BTreeMap<&str, Vec<&Card>> = BTreeMap::new();
    for card in cards {
        groups.entry(card.card_identity.as_str()).or_default().push(card);
    }
    groups
}

/// Distinct values of one field across a group, in first-seen order,
/// or `None` when all members agree.
pub fn disagreement<F>(group: &[&Card], field: F) -> Option<Vec<i32>>
where
    F: Fn(&Card) -> i32,
{
    let first = field(group.first()?);
    if group.iter().all(|c| field(c) == first) {
        return None;
    }
    Some(group.iter().map(|c| field(c)).collect())
}

// ---------------------------------------------------------------------------
// Numbering
// ---------------------------------------------------------------------------

/// A run of unused card numbers, reported as `from` (first missing number)
/// and `to` (the next number actually in use).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingGap {
    pub from: i32,
    pub to: i32,
}

/// Scan card numbers in ascending order against the highest number seen so
/// far, starting at 0. Duplicates and numbers below 1 are not gaps.
pub fn numbering_gaps(cards: &[Card]) -> Vec<NumberingGap> {
    let mut numbers: Vec<i32> = cards.iter().map(|c| c.card_number).collect();
    numbers.sort_unstable();

    let mut gaps = Vec::new();
    let mut high_water = 0i32;
    for number in numbers {
        // At i32::MAX nothing can lie above the mark.
        match high_water.checked_add(1) {
            Some(next) if number > next => gaps.push(NumberingGap {
                from: next,
                to: number,
            }),
            _ => {}
        }
        high_water = high_water.max(number);
    }
    gaps
}

// ---------------------------------------------------------------------------
// Full check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    UntrimmedText { card: String },
    InvalidFlags { card: String },
    SiblingCount { identity: String, count: usize },
    DisagreeingCardNumbers { identity: String, values: Vec<i32> },
    DisagreeingCustomerNumbers { identity: String, values: Vec<i32> },
    ConflictingText { identity: String },
    NumberingGap(NumberingGap),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UntrimmedText { card } => write!(f, "untrimmed text: {}", card),
            Violation::InvalidFlags { card } => write!(f, "invalid flags: {}", card),
            Violation::SiblingCount { identity, count } => {
                write!(f, "{} has {} entries, expected {}", identity, count, SIBLINGS_PER_CARD)
            }
            Violation::DisagreeingCardNumbers { identity, values } => {
                write!(f, "{} has different card numbers: {}", identity, join(values))
            }
            Violation::DisagreeingCustomerNumbers { identity, values } => {
                write!(f, "{} has different customer numbers: {}", identity, join(values))
            }
            Violation::ConflictingText { identity } => {
                write!(f, "{} has conflicting texts", identity)
            }
            Violation::NumberingGap(gap) => {
                write!(f, "no card(s) at position {}-{}", gap.from, gap.to)
            }
        }
    }
}

pub fn join(values: &[i32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collect every invariant breach in the table.
///
/// Fails only on a data-integrity fault: an active card whose project is
/// not enumerated.
pub fn check_table(cards: &[Card]) -> Result<Vec<Violation>, CardError> {
    let mut violations = Vec::new();

    for card in cards {
        if card.needs_trim() {
            violations.push(Violation::UntrimmedText { card: card.to_string() });
        }
        if !card.is_flags_valid()? {
            violations.push(Violation::InvalidFlags { card: card.to_string() });
        }
    }

    for (identity, group) in group_by_identity(cards) {
        if group.len() != SIBLINGS_PER_CARD {
            violations.push(Violation::SiblingCount {
                identity: identity.to_string(),
                count: group.len(),
            });
        }
        if let Some(values) = disagreement(&group, |c| c.card_number) {
            violations.push(Violation::DisagreeingCardNumbers {
                identity: identity.to_string(),
                values,
            });
        }
        if let Some(values) = disagreement(&group, |c| c.customer_number) {
            violations.push(Violation::DisagreeingCustomerNumbers {
                identity: identity.to_string(),
                values,
            });
        }
        let texts: BTreeSet<&str> = group
            .iter()
            .copied()
            .filter(|c| !c.has_blank_text())
            .filter_map(|c| c.text.as_deref())
            .map(str::trim)
            .collect();
        if texts.len() > 1 {
            violations.push(Violation::ConflictingText {
                identity: identity.to_string(),
            });
        }
    }

    violations.extend(numbering_gaps(cards).into_iter().map(Violation::NumberingGap));
    Ok(violations)
}
