//! Proto ↔ Kernel conversion bridge for card records.

use card_kernel::{Card, CardId, Flags, FLAG_COUNT, NO_FLAGS};

use crate::proto_types::ProtoCard;

pub fn card_to_proto(card: &Card) -> ProtoCard {
    ProtoCard {
        id: card.id.map(|id| id.0),
        customer_number: card.customer_number,
        project_number: card.project_number,
        card_number: card.card_number,
        card_identity: card.card_identity.clone(),
        text: card.text.clone(),
        flags: card.flags().to_vec(),
    }
}

/// Backups only hold persisted rows: a missing id or a flag vector of
/// the wrong length is rejected.
pub fn proto_to_card(proto: &ProtoCard) -> Result<Card, String> {
    let id = proto
        .id
        .ok_or_else(|| format!("card {:?} has no id", proto.card_identity))?;
    if proto.flags.len() != FLAG_COUNT {
        return Err(format!(
            "card {} has {} flags, expected {}",
            id,
            proto.flags.len(),
            FLAG_COUNT
        ));
    }
    let mut flags: Flags = NO_FLAGS;
    flags.copy_from_slice(&proto.flags);
    Ok(Card::from_row(
        CardId(id),
        proto.customer_number,
        proto.project_number,
        proto.card_number,
        proto.card_identity.clone(),
        proto.text.clone(),
        flags,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_preserves_card() {
        let text = Some(" x".to_string());
        let mut card = Card::from_row(CardId(3), 8, 4, 21, "ZK".into(), text, NO_FLAGS);
        card.set_flags(true).unwrap();
        assert_eq!(proto_to_card(&card_to_proto(&card)), Ok(card));
    }

    #[test]
    fn test_bridge_rejects_unsaved_card() {
        let proto = card_to_proto(&Card::new_sibling(1, 2, 3, "ZK"));
        assert!(proto_to_card(&proto).unwrap_err().contains("no id"));
    }

    #[test]
    fn test_bridge_rejects_short_flag_vector() {
        let card = Card::from_row(CardId(1), 1, 2, 3, "ZK".into(), None, NO_FLAGS);
        let mut proto = card_to_proto(&card);
        proto.flags.pop();
        assert!(proto_to_card(&proto).unwrap_err().contains("12 flags"));
    }
}
