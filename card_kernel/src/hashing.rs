//! Card Kernel — Canonical Table Hashing
//!
//! Deterministic canonical serialization + SHA-256 of a card table.
//! Used to fingerprint the table around a repair run and to verify
//! backups.
//!
//! Rules:
//!   - Cards sorted by (card_identity, project_number, id), unsaved last
//!   - Fixed field order, flags as a 13-digit "0"/"1" string
//!   - UTF-8 JSON, no whitespace

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::card::Card;
use crate::TEMPLATE_VERSION;

/// Canonical serialization of a card table to UTF-8 JSON bytes.
pub fn canonical_serialize(cards: &[Card]) -> Vec<u8> {
    let value = build_canonical_value(cards);
    // A Value tree of strings, numbers and nulls always serializes.
    serde_json::to_vec(&value).unwrap_or_default()
}

/// SHA-256 of the canonical serialization. Lowercase hex string.
pub fn table_hash(cards: &[Card]) -> String {
    let digest = Sha256::digest(canonical_serialize(cards));
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn canonical_order(cards: &[Card]) -> Vec<&Card> {
    let mut sorted: Vec<&Card> = cards.iter().collect();
    sorted.sort_by(|a, b| {
        a.card_identity
            .cmp(&b.card_identity)
            .then_with(|| a.project_number.cmp(&b.project_number))
            .then_with(|| match (a.id, b.id) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
    sorted
}

/// Field order: template_version, cards[id, customer_number,
/// project_number, card_number, card_identity, text, flags]
fn build_canonical_value(cards: &[Card]) -> Value {
    let mut list = Vec::with_capacity(cards.len());
    for c in canonical_order(cards) {
        let mut m = Map::new();
        m.insert(
            "id".to_string(),
            c.id.map_or(Value::Null, |id| Value::Number(id.0.into())),
        );
        m.insert("customer_number".to_string(), Value::Number(c.customer_number.into()));
        m.insert("project_number".to_string(), Value::Number(c.project_number.into()));
        m.insert("card_number".to_string(), Value::Number(c.card_number.into()));
        m.insert("card_identity".to_string(), Value::String(c.card_identity.clone()));
        m.insert(
            "text".to_string(),
            c.text.clone().map_or(Value::Null, Value::String),
        );
        let flags: String = c.flags().iter().map(|f| if *f { '1' } else { '0' }).collect();
        m.insert("flags".to_string(), Value::String(flags));
        list.push(Value::Object(m));
    }

    let mut root = Map::new();
    root.insert(
        "template_version".to_string(),
        Value::Number(TEMPLATE_VERSION.into()),
    );
    root.insert("cards".to_string(), Value::Array(list));
    Value::Object(root)
}
