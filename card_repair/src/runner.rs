//! Repair session — sequential pass execution over one store.
//!
//! Run order:
//!   1. load the table, fingerprint it, back it up if configured
//!   2. run each pass in turn; each pass reloads what the previous one wrote
//!   3. reload, fingerprint, diff and re-check the table
//!
//! A failing pass stops the run. Its error is written to the diagnostic
//! log; writes already committed stay in place.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use card_kernel::hashing::table_hash;
use card_kernel::invariants::{check_table, Violation};
use card_kernel::CardError;

use crate::backup::{read_backup, write_backup, BackupError};
use crate::diff::{compare_tables, TableDiff};
use crate::passes::{run_pass, PassError, PassKind, PassOutcome};
use crate::sink::DiagnosticSink;
use crate::store::{CardStore, PersistenceError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("pass {pass} failed: {source}")]
    Pass {
        pass: PassKind,
        #[source]
        source: PassError,
    },
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("backup: {0}")]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Card(#[from] CardError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<PassOutcome>,
    pub backup: Option<PathBuf>,
    pub hash_before: String,
    pub hash_after: String,
    pub diff: TableDiff,
    /// Invariant breaches still present after the run.
    pub remaining: Vec<String>,
}

impl RunReport {
    pub fn total_writes(&self) -> usize {
        self.outcomes.iter().map(|o| o.writes).sum()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| {
                format!(
                    "{:<24} examined {:>5}  findings {:>4}  writes {:>4}",
                    o.pass, o.examined, o.findings, o.writes
                )
            })
            .collect();
        lines.push(format!(
            "inserted {}, texts changed {}, flags changed {}",
            self.diff.inserted.len(),
            self.diff.text_changed.len(),
            self.diff.flags_changed.len()
        ));
        lines.push(format!("table hash {} -> {}", self.hash_before, self.hash_after));
        lines.push(format!("{} invariant violation(s) remain", self.remaining.len()));
        lines
    }
}

pub struct RepairSession<S: CardStore, D: DiagnosticSink> {
    store: S,
    sink: D,
    backup_dir: Option<PathBuf>,
}

impl<S: CardStore, D: DiagnosticSink> RepairSession<S, D> {
    pub fn new(store: S, sink: D) -> Self {
        Self {
            store,
            sink,
            backup_dir: None,
        }
    }

    /// Back the table up to `dir` before a run that may write.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn into_parts(self) -> (S, D) {
        (self.store, self.sink)
    }

    /// Run `passes` in order against the persisted table.
    pub fn run(&mut self, passes: &[PassKind]) -> Result<RunReport, RunError> {
        let before = self.store.load_all()?;
        let hash_before = table_hash(&before);

        let mut backup = None;
        if let Some(dir) = &self.backup_dir {
            if passes.iter().any(|p| !p.is_read_only()) {
                let info = write_backup(dir, &before)?;
                self.sink.line(&format!(
                    "Backup of {} cards written to {}",
                    info.card_count,
                    info.path.display()
                ));
                backup = Some(info.path);
            }
        }

        let mut outcomes = Vec::with_capacity(passes.len());
        for &pass in passes {
            match run_pass(pass, &mut self.store, &mut self.sink) {
                Ok(outcome) => outcomes.push(outcome),
                Err(source) => {
                    error!(%pass, error = %source, "pass aborted");
                    self.sink.line(&format!("Error in {}: {}", pass, source));
                    return Err(RunError::Pass { pass, source });
                }
            }
        }

        let after = self.store.load_all()?;
        let report = RunReport {
            diff: compare_tables(&before, &after),
            hash_before,
            hash_after: table_hash(&after),
            remaining: check_table(&after)?.iter().map(Violation::to_string).collect(),
            outcomes,
            backup,
        };
        info!(
            passes = report.outcomes.len(),
            writes = report.total_writes(),
            remaining = report.remaining.len(),
            "repair run finished"
        );
        Ok(report)
    }

    /// Read-only invariant report of the current table.
    pub fn check(&mut self) -> Result<Vec<Violation>, RunError> {
        let cards = self.store.load_all()?;
        let violations = check_table(&cards)?;
        self.sink.line(&format!(
            "Checked {} cards: {} violation(s)",
            cards.len(),
            violations.len()
        ));
        for v in &violations {
            self.sink.line(&v.to_string());
        }
        Ok(violations)
    }

    /// Write a backup of the current table to `dir`.
    pub fn backup(&mut self, dir: &Path) -> Result<PathBuf, RunError> {
        let cards = self.store.load_all()?;
        let info = write_backup(dir, &cards)?;
        self.sink.line(&format!(
            "Backup of {} cards written to {}",
            info.card_count,
            info.path.display()
        ));
        Ok(info.path)
    }

    /// Replace the table with a verified backup. Returns the card count.
    pub fn restore(&mut self, path: &Path) -> Result<usize, RunError> {
        let cards = read_backup(path)?;
        self.store.replace_all(&cards)?;
        self.sink
            .line(&format!("Restored {} cards from {}", cards.len(), path.display()));
        info!(path = %path.display(), cards = cards.len(), "table restored");
        Ok(cards.len())
    }
}
