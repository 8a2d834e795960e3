#![forbid(unsafe_code)]

//! Card Kernel — PRS602 access-card model.
//!
//! Card records, the per-project permission templates and pure table
//! analyses. No I/O: loading and writing belong to `card_repair`.

/// Version of the permission template table. Part of the canonical hash.
pub const TEMPLATE_VERSION: u32 = 1;

pub mod error;
pub mod project;
pub mod flags;
pub mod card;
pub mod invariants;
pub mod hashing;

pub use card::{is_blank, Card, CardId};
pub use error::CardError;
pub use flags::{active_template, expected_flags, Flags, FLAG_COUNT, FLAG_NAMES, NO_FLAGS};
pub use project::{MASTER_PROJECT, PROJECT_IDS};
