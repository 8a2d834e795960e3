//! SQLite binding of the card table.
//!
//! Table layout follows the PRS602 `ECCards` table: one row per card,
//! one boolean column per permission flag, named as in `FLAG_NAMES`.
//! Insert and update statements are built once from the flag names.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use card_kernel::{Card, CardId, Flags, FLAG_NAMES, NO_FLAGS};

use crate::store::{CardStore, PersistenceError};

pub const TABLE: &str = "ECCards";

/// Non-flag columns, in select order after `ID`.
const FIELD_COLUMNS: [&str; 5] = ["KndNr", "ProjNr", "Kartennr", "CardZK", "Text"];

pub struct SqliteCardStore {
    conn: Connection,
    select_sql: String,
    insert_sql: String,
    insert_with_id_sql: String,
    update_sql: String,
}

impl SqliteCardStore {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Ok(Self::with_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Ok(Self::with_connection(Connection::open_in_memory()?))
    }

    pub fn with_connection(conn: Connection) -> Self {
        let columns: Vec<&str> = FIELD_COLUMNS.iter().chain(FLAG_NAMES.iter()).copied().collect();
        let quoted: Vec<String> = columns.iter().map(|c| format!("[{}]", c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let select_sql = format!(
            "SELECT [ID], {} FROM [{}] ORDER BY [ID]",
            quoted.join(", "),
            TABLE
        );
        let insert_sql = format!(
            "INSERT INTO [{}] ({}) VALUES ({})",
            TABLE,
            quoted.join(", "),
            placeholders.join(", ")
        );
        let insert_with_id_sql = format!(
            "INSERT INTO [{}] ({}, [ID]) VALUES ({}, ?{})",
            TABLE,
            quoted.join(", "),
            placeholders.join(", "),
            columns.len() + 1
        );
        let assignments: Vec<String> = quoted
            .iter()
            .zip(&placeholders)
            .map(|(c, p)| format!("{} = {}", c, p))
            .collect();
        let update_sql = format!(
            "UPDATE [{}] SET {} WHERE [ID] = ?{}",
            TABLE,
            assignments.join(", "),
            columns.len() + 1
        );

        Self {
            conn,
            select_sql,
            insert_sql,
            insert_with_id_sql,
            update_sql,
        }
    }

    /// Create the card table if it does not exist yet.
    pub fn create_schema(&self) -> Result<(), PersistenceError> {
        let flag_columns: Vec<String> = FLAG_NAMES
            .iter()
            .map(|f| format!("[{0}] INTEGER NOT NULL DEFAULT 0 CHECK ([{0}] IN (0, 1))", f))
            .collect();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS [{}] (
               [ID] INTEGER PRIMARY KEY AUTOINCREMENT,
               [KndNr] INTEGER NOT NULL,
               [ProjNr] INTEGER NOT NULL,
               [Kartennr] INTEGER NOT NULL,
               [CardZK] TEXT NOT NULL,
               [Text] TEXT,
               {}
             );",
            TABLE,
            flag_columns.join(",\n               ")
        );
        self.conn.execute_batch(&ddl)?;
        Ok(())
    }

    pub fn table_exists(&self) -> Result<bool, PersistenceError> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![TABLE],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn field_values(card: &Card) -> Vec<Value> {
        let mut values = vec![
            Value::Integer(i64::from(card.customer_number)),
            Value::Integer(i64::from(card.project_number)),
            Value::Integer(i64::from(card.card_number)),
            Value::Text(card.card_identity.clone()),
            card.text.clone().map_or(Value::Null, Value::Text),
        ];
        values.extend(card.flags().iter().map(|f| Value::Integer(i64::from(*f))));
        values
    }
}

fn parse_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let mut flags: Flags = NO_FLAGS;
    for (i, flag) in flags.iter_mut().enumerate() {
        *flag = row.get(1 + FIELD_COLUMNS.len() + i)?;
    }
    Ok(Card::from_row(
        CardId(row.get(0)?),
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        flags,
    ))
}

impl CardStore for SqliteCardStore {
    fn load_all(&mut self) -> Result<Vec<Card>, PersistenceError> {
        let mut stmt = self.conn.prepare_cached(&self.select_sql)?;
        let rows = stmt.query_map([], parse_row)?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?);
        }
        debug!(count = cards.len(), "loaded cards");
        Ok(cards)
    }

    fn save(&mut self, card: &mut Card) -> Result<(), PersistenceError> {
        let mut values = Self::field_values(card);
        match card.id {
            Some(id) => {
                values.push(Value::Integer(id.0));
                let changed = self.conn.execute(&self.update_sql, params_from_iter(values))?;
                if changed == 0 {
                    return Err(PersistenceError::NotFound(id));
                }
                debug!(%id, "updated card");
            }
            None => {
                self.conn.execute(&self.insert_sql, params_from_iter(values))?;
                let id = CardId(self.conn.last_insert_rowid());
                card.id = Some(id);
                debug!(%id, "inserted card");
            }
        }
        Ok(())
    }

    fn delete(&mut self, card: &Card) -> Result<(), PersistenceError> {
        let Some(id) = card.id else {
            return Ok(());
        };
        self.conn
            .execute(&format!("DELETE FROM [{}] WHERE [ID] = ?1", TABLE), params![id.0])?;
        debug!(%id, "deleted card");
        Ok(())
    }

    fn replace_all(&mut self, cards: &[Card]) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM [{}]", TABLE), [])?;
        for card in cards {
            let id = card
                .id
                .ok_or_else(|| PersistenceError::Malformed("restored card has no id".into()))?;
            let mut values = Self::field_values(card);
            values.push(Value::Integer(id.0));
            tx.execute(&self.insert_with_id_sql, params_from_iter(values))?;
        }
        tx.commit()?;
        debug!(count = cards.len(), "replaced card table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteCardStore {
        let store = SqliteCardStore::open_in_memory().unwrap();
        store.create_schema().unwrap();
        store
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let s = store();
        assert!(s.table_exists().unwrap());
        s.create_schema().unwrap();
    }

    #[test]
    fn test_missing_table_is_reported() {
        let s = SqliteCardStore::open_in_memory().unwrap();
        assert!(!s.table_exists().unwrap());
    }

    #[test]
    fn test_insert_then_update_round_trip() {
        let mut s = store();
        let mut card = Card::new_sibling(17, 4, 33, "ZK-1");
        card.text = Some("Lobby".into());
        card.set_flags(true).unwrap();
        s.save(&mut card).unwrap();
        let id = card.id.expect("insert assigns an id");

        let loaded = s.load_all().unwrap();
        assert_eq!(loaded, vec![card.clone()]);

        card.set_flags(false).unwrap();
        card.text = None;
        s.save(&mut card).unwrap();
        let loaded = s.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, Some(id));
        assert!(!loaded[0].is_active());
        assert_eq!(loaded[0].text, None);
    }

    #[test]
    fn test_update_of_missing_id_fails() {
        let mut s = store();
        let mut card = Card::new_sibling(1, 2, 1, "X");
        card.id = Some(CardId(77));
        assert!(matches!(s.save(&mut card), Err(PersistenceError::NotFound(CardId(77)))));
    }

    #[test]
    fn test_delete() {
        let mut s = store();
        let mut a = Card::new_sibling(1, 2, 1, "X");
        let mut b = Card::new_sibling(1, 3, 1, "X");
        s.save(&mut a).unwrap();
        s.save(&mut b).unwrap();
        s.delete(&a).unwrap();
        s.delete(&Card::new_sibling(1, 4, 1, "X")).unwrap();
        assert_eq!(s.load_all().unwrap(), vec![b]);
    }

    #[test]
    fn test_replace_all_keeps_ids() {
        let mut s = store();
        let mut a = Card::new_sibling(1, 2, 1, "X");
        s.save(&mut a).unwrap();

        let restored = vec![
            Card::from_row(CardId(10), 5, 2, 9, "R".into(), None, NO_FLAGS),
            Card::from_row(CardId(12), 5, 3, 9, "R".into(), Some("t".into()), NO_FLAGS),
        ];
        s.replace_all(&restored).unwrap();
        assert_eq!(s.load_all().unwrap(), restored);
    }
}
