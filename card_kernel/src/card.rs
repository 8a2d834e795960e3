//! Card Kernel — Card Record
//!
//! One row of the card table: a project-scoped instance of a physical card.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CardError;
use crate::flags::{active_template, Flags, NO_FLAGS};

/// Storage-assigned row identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// `None` until the record has been inserted.
    pub id: Option<CardId>,
    pub customer_number: i32,
    pub project_number: i32,
    pub card_number: i32,
    pub card_identity: String,
    pub text: Option<String>,
    flags: Flags,
}

/// Absent, empty or whitespace-only text.
pub fn is_blank(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}

impl Card {
    /// A persisted record as read back from storage.
    pub fn from_row(
        id: CardId,
        customer_number: i32,
        project_number: i32,
        card_number: i32,
        card_identity: String,
        text: Option<String>,
        flags: Flags,
    ) -> Self {
        Self {
            id: Some(id),
            customer_number,
            project_number,
            card_number,
            card_identity,
            text,
            flags,
        }
    }

    /// A new, not yet persisted sibling record: no text, all flags off.
    pub fn new_sibling(
        customer_number: i32,
        project_number: i32,
        card_number: i32,
        card_identity: &str,
    ) -> Self {
        Self {
            id: None,
            customer_number,
            project_number,
            card_number,
            card_identity: card_identity.to_string(),
            text: None,
            flags: NO_FLAGS,
        }
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Overwrite the raw vector. Any combination is accepted; use
    /// `set_flags` to apply a valid pattern.
    pub fn set_raw_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    pub fn is_active(&self) -> bool {
        self.flags.iter().any(|f| *f)
    }

    /// All flags off, or exactly the active template of the card's project.
    pub fn is_flags_valid(&self) -> Result<bool, CardError> {
        if !self.is_active() {
            return Ok(true);
        }
        Ok(&self.flags == active_template(self.project_number)?)
    }

    /// Apply the project's template (`active`) or clear every flag.
    /// The card is left untouched if its project is not enumerated.
    pub fn set_flags(&mut self, active: bool) -> Result<(), CardError> {
        let template = active_template(self.project_number)?;
        self.flags = if active { *template } else { NO_FLAGS };
        Ok(())
    }

    pub fn has_blank_text(&self) -> bool {
        is_blank(self.text.as_deref())
    }

    /// Text present and carrying surrounding whitespace.
    pub fn needs_trim(&self) -> bool {
        self.text.as_deref().map_or(false, |t| t != t.trim())
    }
}

/// `project-1 <TAB> card_number <TAB> (id) <TAB> identity <TAB> text`
impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self.id {
            Some(id) => id.to_string(),
            None => "new".to_string(),
        };
        write!(
            f,
            "{}\t{}\t({})\t{}\t{}",
            i64::from(self.project_number) - 1,
            self.card_number,
            id,
            self.card_identity,
            self.text.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FLAG_COUNT;
    use crate::project::PROJECT_IDS;

    fn card(project: i32) -> Card {
        Card::new_sibling(100, project, 7, "A1")
    }

    #[test]
    fn test_new_sibling_is_inactive_and_unsaved() {
        let c = card(3);
        assert_eq!(c.id, None);
        assert!(!c.is_active());
        assert_eq!(c.is_flags_valid(), Ok(true));
        assert_eq!(c.text, None);
    }

    #[test]
    fn test_set_flags_round_trips_validity() {
        for project in PROJECT_IDS {
            for state in [true, false] {
                let mut c = card(project);
                c.set_flags(state).unwrap();
                assert_eq!(c.is_active(), state);
                assert_eq!(c.is_flags_valid(), Ok(true), "project {} state {}", project, state);
            }
        }
    }

    #[test]
    fn test_set_flags_invalid_project_leaves_card_unchanged() {
        let mut c = card(9);
        c.set_raw_flags([true; FLAG_COUNT]);
        assert_eq!(c.set_flags(false), Err(CardError::InvalidProject(9)));
        assert!(c.is_active());
    }

    #[test]
    fn test_partial_pattern_is_invalid() {
        let mut c = card(2);
        c.set_flags(true).unwrap();
        let mut flags = *c.flags();
        flags[0] = false;
        c.set_raw_flags(flags);
        assert_eq!(c.is_flags_valid(), Ok(false));
    }

    #[test]
    fn test_other_projects_template_is_invalid() {
        let mut c = card(4);
        c.set_raw_flags(*active_template(2).unwrap());
        assert_eq!(c.is_flags_valid(), Ok(false));
    }

    #[test]
    fn test_validity_on_unknown_project() {
        let mut c = card(1);
        assert_eq!(c.is_flags_valid(), Ok(true));
        c.set_raw_flags([true; FLAG_COUNT]);
        assert_eq!(c.is_flags_valid(), Err(CardError::InvalidProject(1)));
    }

    #[test]
    fn test_needs_trim() {
        let mut c = card(2);
        assert!(!c.needs_trim());
        c.text = Some("Lobby".to_string());
        assert!(!c.needs_trim());
        c.text = Some(" Lobby\t".to_string());
        assert!(c.needs_trim());
    }

    #[test]
    fn test_blank_text() {
        assert!(is_blank(None));
        assert!(is_blank(Some("")));
        assert!(is_blank(Some("  \t")));
        assert!(!is_blank(Some(" x ")));
    }

    #[test]
    fn test_display() {
        let text = Some("Lobby".to_string());
        let mut c = Card::from_row(CardId(12), 100, 3, 7, "A1".into(), text, NO_FLAGS);
        assert_eq!(c.to_string(), "2\t7\t(12)\tA1\tLobby");
        c.id = None;
        c.text = None;
        assert_eq!(c.to_string(), "2\t7\t(new)\tA1\t");
    }

    #[test]
    fn test_display_of_extreme_project_number() {
        let c = Card::from_row(CardId(1), 0, i32::MIN, 0, "X".into(), None, NO_FLAGS);
        assert_eq!(c.to_string(), "-2147483649\t0\t(1)\tX\t");
    }
}
