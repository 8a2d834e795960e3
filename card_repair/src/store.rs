//! Card storage — the persistence seam of the repair passes.
//!
//! Passes only ever see a `CardStore`: one bulk `load_all` per pass,
//! then individual `save` / `delete` calls. There is no transaction
//! spanning a pass; every write commits on its own.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use card_kernel::{Card, CardId};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("no card with id {0}")]
    NotFound(CardId),
    #[error("stored row is malformed: {0}")]
    Malformed(String),
    #[error("write refused: {0}")]
    Injected(String),
}

pub trait CardStore {
    /// Every current record, in storage order.
    fn load_all(&mut self) -> Result<Vec<Card>, PersistenceError>;

    /// Insert when `card.id` is `None` (the assigned id is written back
    /// into `card`), otherwise update the row with that id.
    fn save(&mut self, card: &mut Card) -> Result<(), PersistenceError>;

    /// Remove the row with `card.id`. No-op for an unsaved card.
    fn delete(&mut self, card: &Card) -> Result<(), PersistenceError>;

    /// Replace the whole table, keeping each card's id. Used by restore.
    fn replace_all(&mut self, cards: &[Card]) -> Result<(), PersistenceError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Ordered in-memory table. Storage order is id order.
#[derive(Debug, Default)]
pub struct MemoryCardStore {
    rows: BTreeMap<CardId, Card>,
    next_id: i64,
    writes: usize,
    fail_after: Option<usize>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table. Unsaved cards get fresh ids above every seeded id,
    /// in input order; seeding is not counted as writes.
    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut store = Self::new();
        let (saved, unsaved): (Vec<Card>, Vec<Card>) =
            cards.into_iter().partition(|c| c.id.is_some());
        for card in saved {
            if let Some(id) = card.id {
                store.next_id = store.next_id.max(id.0);
                store.rows.insert(id, card);
            }
        }
        for mut card in unsaved {
            let id = store.allocate_id();
            card.id = Some(id);
            store.rows.insert(id, card);
        }
        store
    }

    /// Refuse every write after `n` successful ones.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Successful inserts, updates and deletes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.rows.get(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn allocate_id(&mut self) -> CardId {
        self.next_id += 1;
        CardId(self.next_id)
    }

    fn check_write(&self) -> Result<(), PersistenceError> {
        match self.fail_after {
            Some(n) if self.writes >= n => Err(PersistenceError::Injected(format!(
                "write limit of {} reached",
                n
            ))),
            _ => Ok(()),
        }
    }
}

impl CardStore for MemoryCardStore {
    fn load_all(&mut self) -> Result<Vec<Card>, PersistenceError> {
        Ok(self.rows.values().cloned().collect())
    }

    fn save(&mut self, card: &mut Card) -> Result<(), PersistenceError> {
        self.check_write()?;
        match card.id {
            Some(id) => {
                let row = self.rows.get_mut(&id).ok_or(PersistenceError::NotFound(id))?;
                *row = card.clone();
                debug!(%id, "updated card");
            }
            None => {
                let id = self.allocate_id();
                card.id = Some(id);
                self.rows.insert(id, card.clone());
                debug!(%id, "inserted card");
            }
        }
        self.writes += 1;
        Ok(())
    }

    fn delete(&mut self, card: &Card) -> Result<(), PersistenceError> {
        let Some(id) = card.id else {
            return Ok(());
        };
        self.check_write()?;
        if self.rows.remove(&id).is_some() {
            self.writes += 1;
            debug!(%id, "deleted card");
        }
        Ok(())
    }

    fn replace_all(&mut self, cards: &[Card]) -> Result<(), PersistenceError> {
        self.check_write()?;
        let mut rows = BTreeMap::new();
        for card in cards {
            let id = card
                .id
                .ok_or_else(|| PersistenceError::Malformed("restored card has no id".into()))?;
            rows.insert(id, card.clone());
        }
        self.next_id = rows.keys().next_back().map_or(0, |id| id.0);
        self.rows = rows;
        self.writes += 1;
        Ok(())
    }
}
