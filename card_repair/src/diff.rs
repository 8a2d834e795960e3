//! Table diff — what a repair run changed.
//!
//! Compares two loads of the card table by row id.

use std::collections::BTreeMap;

use serde::Serialize;

use card_kernel::{Card, CardId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableDiff {
    pub inserted: Vec<CardId>,
    pub deleted: Vec<CardId>,
    /// Rows present in both whose text changed.
    pub text_changed: Vec<CardId>,
    /// Rows present in both whose flags changed.
    pub flags_changed: Vec<CardId>,
    /// Rows present in both with any other field changed.
    pub other_changed: Vec<CardId>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.deleted.is_empty()
            && self.text_changed.is_empty()
            && self.flags_changed.is_empty()
            && self.other_changed.is_empty()
    }
}

fn by_id(cards: &[Card]) -> BTreeMap<CardId, &Card> {
    cards
        .iter()
        .filter_map(|c| c.id.map(|id| (id, c)))
        .collect()
}

pub fn compare_tables(before: &[Card], after: &[Card]) -> TableDiff {
    let a = by_id(before);
    let b = by_id(after);
    let mut diff = TableDiff::default();

    for (id, old) in &a {
        let Some(new) = b.get(id) else {
            diff.deleted.push(*id);
            continue;
        };
        if old.text != new.text {
            diff.text_changed.push(*id);
        }
        if old.flags() != new.flags() {
            diff.flags_changed.push(*id);
        }
        if (old.customer_number, old.project_number, old.card_number, &old.card_identity)
            != (new.customer_number, new.project_number, new.card_number, &new.card_identity)
        {
            diff.other_changed.push(*id);
        }
    }
    diff.inserted = b.keys().filter(|id| !a.contains_key(*id)).copied().collect();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_kernel::NO_FLAGS;

    fn row(id: i64, project: i32, text: Option<&str>) -> Card {
        Card::from_row(CardId(id), 1, project, 1, "A".into(), text.map(Into::into), NO_FLAGS)
    }

    #[test]
    fn test_identical_tables() {
        let t = vec![row(1, 2, None), row(2, 3, Some("x"))];
        assert!(compare_tables(&t, &t).is_empty());
    }

    #[test]
    fn test_detects_each_change_kind() {
        let before = vec![row(1, 2, Some(" x")), row(2, 3, None), row(3, 4, None)];
        let mut changed_flags = row(2, 3, None);
        changed_flags.set_flags(true).unwrap();
        let mut renumbered = row(3, 4, None);
        renumbered.card_number = 9;
        let after = vec![row(1, 2, Some("x")), changed_flags, renumbered, row(4, 2, None)];

        let diff = compare_tables(&before, &after);
        assert_eq!(diff.text_changed, vec![CardId(1)]);
        assert_eq!(diff.flags_changed, vec![CardId(2)]);
        assert_eq!(diff.other_changed, vec![CardId(3)]);
        assert_eq!(diff.inserted, vec![CardId(4)]);
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_detects_deletion() {
        let diff = compare_tables(&[row(1, 2, None)], &[]);
        assert_eq!(diff.deleted, vec![CardId(1)]);
    }
}
