//! Hand-written protobuf types for card table backups.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the backup format: never renumber.

use prost::Message;

// ── Backup Header ──────────────────────────────────────────────

/// First frame of every backup file.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoBackupHeader {
    #[prost(uint32, tag = "1")]
    pub format_version: u32,
    #[prost(uint32, tag = "2")]
    pub template_version: u32,
    #[prost(uint64, tag = "3")]
    pub card_count: u64,
    /// Canonical table hash of the backed-up cards.
    #[prost(string, tag = "4")]
    pub table_hash: String,
}

// ── Card ───────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoCard {
    #[prost(int64, optional, tag = "1")]
    pub id: Option<i64>,
    #[prost(int32, tag = "2")]
    pub customer_number: i32,
    #[prost(int32, tag = "3")]
    pub project_number: i32,
    #[prost(int32, tag = "4")]
    pub card_number: i32,
    #[prost(string, tag = "5")]
    pub card_identity: String,
    #[prost(string, optional, tag = "6")]
    pub text: Option<String>,
    /// In `FLAG_NAMES` order.
    #[prost(bool, repeated, tag = "7")]
    pub flags: Vec<bool>,
}
