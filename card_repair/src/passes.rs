//! Repair passes — the reconciliation engine.
//!
//! Every pass follows the same shape:
//!   1. load the whole table once from the store
//!   2. decide, logging findings to the diagnostic sink
//!   3. persist exactly the records it changed, one write each
//!
//! Passes share nothing in memory. Whatever an earlier pass wrote is seen
//! by a later one only through the store. Writes are not transactional:
//! a failing write aborts the pass and leaves earlier writes committed.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use card_kernel::flags::render_flags;
use card_kernel::invariants::{disagreement, group_by_identity, join, numbering_gaps};
use card_kernel::project::{is_master, SIBLINGS_PER_CARD};
use card_kernel::{expected_flags, Card, CardError, PROJECT_IDS};

use crate::sink::DiagnosticSink;
use crate::store::{CardStore, PersistenceError};

#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PassKind {
    TrimTexts,
    AuditFlags,
    CompleteSiblings,
    PropagateDescriptions,
    FindNumberingGaps,
}

impl PassKind {
    /// Run order of a full repair.
    pub const DEFAULT_ORDER: [PassKind; 5] = [
        PassKind::TrimTexts,
        PassKind::PropagateDescriptions,
        PassKind::CompleteSiblings,
        PassKind::FindNumberingGaps,
        PassKind::AuditFlags,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PassKind::TrimTexts => "trim-texts",
            PassKind::AuditFlags => "audit-flags",
            PassKind::CompleteSiblings => "complete-siblings",
            PassKind::PropagateDescriptions => "propagate-descriptions",
            PassKind::FindNumberingGaps => "find-numbering-gaps",
        }
    }

    /// Passes that never write.
    pub fn is_read_only(self) -> bool {
        matches!(self, PassKind::AuditFlags | PassKind::FindNumberingGaps)
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassOutcome {
    pub pass: PassKind,
    /// Records loaded at pass start.
    pub examined: usize,
    /// Diagnostic findings logged to the sink.
    pub findings: usize,
    /// Inserts and updates committed.
    pub writes: usize,
}

impl PassOutcome {
    fn new(pass: PassKind, examined: usize) -> Self {
        Self {
            pass,
            examined,
            findings: 0,
            writes: 0,
        }
    }
}

/// Run one pass against the current persisted table.
pub fn run_pass(
    pass: PassKind,
    store: &mut dyn CardStore,
    sink: &mut dyn DiagnosticSink,
) -> Result<PassOutcome, PassError> {
    info!(%pass, "pass started");
    let outcome = match pass {
        PassKind::TrimTexts => trim_texts(store, sink),
        PassKind::AuditFlags => audit_flags(store, sink),
        PassKind::CompleteSiblings => complete_siblings(store, sink),
        PassKind::PropagateDescriptions => propagate_descriptions(store, sink),
        PassKind::FindNumberingGaps => find_numbering_gaps(store, sink),
    }?;
    info!(
        %pass,
        examined = outcome.examined,
        findings = outcome.findings,
        writes = outcome.writes,
        "pass finished"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// 1. Text normalization
// ---------------------------------------------------------------------------

/// Trim surrounding whitespace from every card text.
pub fn trim_texts(
    store: &mut dyn CardStore,
    sink: &mut dyn DiagnosticSink,
) -> Result<PassOutcome, PassError> {
    sink.line("Fixing texts...");
    let cards = store.load_all()?;
    let mut outcome = PassOutcome::new(PassKind::TrimTexts, cards.len());

    let mut to_trim: Vec<Card> = cards.into_iter().filter(Card::needs_trim).collect();
    for card in &mut to_trim {
        sink.line(&card.to_string());
        card.text = card.text.as_deref().map(|t| t.trim().to_string());
        outcome.findings += 1;
    }

    for card in &mut to_trim {
        store.save(card)?;
        outcome.writes += 1;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// 2. Flag validity audit
// ---------------------------------------------------------------------------

/// Report every card whose flags are neither all-false nor its project's
/// template. Invalid flags are reported, never rewritten.
pub fn audit_flags(
    store: &mut dyn CardStore,
    sink: &mut dyn DiagnosticSink,
) -> Result<PassOutcome, PassError> {
    sink.line("Testing card validity...");
    let cards = store.load_all()?;
    let mut outcome = PassOutcome::new(PassKind::AuditFlags, cards.len());

    for card in &cards {
        if card.is_flags_valid()? {
            continue;
        }
        sink.line(&card.to_string());
        sink.line(&format!(
            "     flags:{}  expected:{}",
            render_flags(card.flags().iter().copied()),
            render_flags(expected_flags(card.project_number)?)
        ));
        outcome.findings += 1;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// 3. Sibling completion
// ---------------------------------------------------------------------------

/// Create the missing per-project records of every physical card whose
/// existing records agree on card and customer number.
///
/// The source of copied fields is the member with the lowest project
/// number (then lowest id). New records take the source's activity under
/// their own project's template.
pub fn complete_siblings(
    store: &mut dyn CardStore,
    sink: &mut dyn DiagnosticSink,
) -> Result<PassOutcome, PassError> {
    sink.line("Creating missing cards...");
    let cards = store.load_all()?;
    let mut outcome = PassOutcome::new(PassKind::CompleteSiblings, cards.len());
    let mut created: Vec<Card> = Vec::new();

    for (identity, mut group) in group_by_identity(&cards) {
        group.sort_by_key(|c| (c.project_number, c.id));

        if group.len() != SIBLINGS_PER_CARD {
            sink.line(&format!("{} have {} entries", identity, group.len()));
            outcome.findings += 1;
        }

        let mut unique = true;
        if let Some(values) = disagreement(&group, |c| c.card_number) {
            unique = false;
            sink.line(&format!("{} have different card numbers: {}", identity, join(&values)));
            outcome.findings += 1;
        }
        if let Some(values) = disagreement(&group, |c| c.customer_number) {
            unique = false;
            sink.line(&format!(
                "{} have different customer numbers: {}",
                identity,
                join(&values)
            ));
            outcome.findings += 1;
        }

        if !unique || group.len() >= SIBLINGS_PER_CARD {
            continue;
        }
        let source = group[0];
        for project in PROJECT_IDS {
            if group.iter().any(|c| c.project_number == project) {
                continue;
            }
            let mut card = Card::new_sibling(
                source.customer_number,
                project,
                source.card_number,
                &source.card_identity,
            );
            card.text = source.text.clone();
            card.set_flags(source.is_active())?;
            sink.line(&format!("Creating new card {}", card));
            created.push(card);
        }
    }

    for card in &mut created {
        store.save(card)?;
        outcome.writes += 1;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// 4. Description propagation
// ---------------------------------------------------------------------------

/// Copy master-project descriptions onto blank slave siblings. An identity
/// whose slaves already carry a different description is left alone.
pub fn propagate_descriptions(
    store: &mut dyn CardStore,
    sink: &mut dyn DiagnosticSink,
) -> Result<PassOutcome, PassError> {
    sink.line("Fixing card text comments...");
    let mut cards = store.load_all()?;
    let mut outcome = PassOutcome::new(PassKind::PropagateDescriptions, cards.len());

    let (masters, slaves): (Vec<usize>, Vec<usize>) =
        (0..cards.len()).partition(|&i| is_master(cards[i].project_number));
    let shares_identity = |a: usize, others: &[usize]| {
        others
            .iter()
            .any(|&o| cards[o].card_identity == cards[a].card_identity)
    };

    sink.line("Master unique cards:");
    for &m in &masters {
        if !shares_identity(m, &slaves) {
            sink.line(&cards[m].to_string());
            outcome.findings += 1;
        }
    }
    sink.blank();

    sink.line("Slave unique cards:");
    for &s in &slaves {
        if !shares_identity(s, &masters) {
            sink.line(&cards[s].to_string());
            outcome.findings += 1;
        }
    }
    sink.blank();

    let mut updated: Vec<usize> = Vec::new();
    for &m in &masters {
        let master_text = match cards[m].text.as_deref() {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => continue,
        };
        let siblings: Vec<usize> = slaves
            .iter()
            .copied()
            .filter(|&s| cards[s].card_identity == cards[m].card_identity)
            .collect();

        let conflict = siblings.iter().any(|&s| {
            !cards[s].has_blank_text() && cards[s].text.as_deref() != Some(master_text.as_str())
        });
        if conflict {
            sink.line("different texts:");
            sink.line(&format!("\t{}", cards[m]));
            for &s in &siblings {
                sink.line(&format!("\t{}", cards[s]));
            }
            outcome.findings += 1;
            continue;
        }

        for s in siblings {
            if !cards[s].has_blank_text() {
                continue;
            }
            sink.line(&format!(
                "Copying '{}' to card '{}' in project {}",
                master_text, cards[s].card_identity, cards[s].project_number
            ));
            cards[s].text = Some(master_text.clone());
            if !updated.contains(&s) {
                updated.push(s);
            }
        }
    }

    for s in updated {
        store.save(&mut cards[s])?;
        outcome.writes += 1;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// 5. Numbering gaps
// ---------------------------------------------------------------------------

/// Report unused card numbers below the highest one in use.
pub fn find_numbering_gaps(
    store: &mut dyn CardStore,
    sink: &mut dyn DiagnosticSink,
) -> Result<PassOutcome, PassError> {
    sink.line("Finding card numbering holes...");
    let cards = store.load_all()?;
    let mut outcome = PassOutcome::new(PassKind::FindNumberingGaps, cards.len());

    for gap in numbering_gaps(&cards) {
        sink.line(&format!("No card(s) at position {}-{}", gap.from, gap.to));
        outcome.findings += 1;
    }
    Ok(outcome)
}
