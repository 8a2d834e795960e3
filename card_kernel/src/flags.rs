//! Card Kernel — Permission Flags
//!
//! Fixed-order permission vector and the per-project active templates.
//! The template table is computed at compile time and never mutated.

use crate::error::CardError;
use crate::project::{project_index, PROJECT_IDS};

pub const FLAG_COUNT: usize = 13;

/// Column names of the permission flags, in vector order.
pub const FLAG_NAMES: [&str; FLAG_COUNT] = [
    "TO1", "TO2", "TO3", "TO4", "TO5", "TO6", "TO7", "TO8", "SO1", "SO2", "SO3", "SO4", "Zeitg",
];

pub type Flags = [bool; FLAG_COUNT];

/// The inactive pattern, valid for every project.
pub const NO_FLAGS: Flags = [false; FLAG_COUNT];

const TO8: usize = 7;
const SO3: usize = 10;
const SO4: usize = 11;
const ZEITG: usize = 12;

/// Permissions never granted, whatever the project.
const DISABLED_EVERYWHERE: [usize; 2] = [TO8, ZEITG];

/// Permissions not granted in `SO_RESTRICTED_PROJECTS`.
const SO_RESTRICTED: [usize; 2] = [SO3, SO4];
const SO_RESTRICTED_PROJECTS: [i32; 2] = [2, 3];

// ---------------------------------------------------------------------------
// Template table
// ---------------------------------------------------------------------------

const fn contains(projects: &[i32], project: i32) -> bool {
    let mut i = 0;
    while i < projects.len() {
        if projects[i] == project {
            return true;
        }
        i += 1;
    }
    false
}

const fn build_template(project: i32) -> Flags {
    let mut flags = [true; FLAG_COUNT];
    let mut i = 0;
    while i < DISABLED_EVERYWHERE.len() {
        flags[DISABLED_EVERYWHERE[i]] = false;
        i += 1;
    }
    if contains(&SO_RESTRICTED_PROJECTS, project) {
        let mut j = 0;
        while j < SO_RESTRICTED.len() {
            flags[SO_RESTRICTED[j]] = false;
            j += 1;
        }
    }
    flags
}

const fn build_templates() -> [Flags; PROJECT_IDS.len()] {
    let mut table = [NO_FLAGS; PROJECT_IDS.len()];
    let mut i = 0;
    while i < PROJECT_IDS.len() {
        table[i] = build_template(PROJECT_IDS[i]);
        i += 1;
    }
    table
}

/// Active templates indexed like `PROJECT_IDS`.
static PROJECT_TEMPLATES: [Flags; PROJECT_IDS.len()] = build_templates();

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The single permitted non-zero pattern for `project`.
pub fn active_template(project: i32) -> Result<&'static Flags, CardError> {
    Ok(&PROJECT_TEMPLATES[project_index(project)?])
}

/// Restartable sequence over a project's active template.
pub type ExpectedFlags = std::iter::Copied<std::slice::Iter<'static, bool>>;

/// The active template of `project`, as a sequence for reporting.
pub fn expected_flags(project: i32) -> Result<ExpectedFlags, CardError> {
    Ok(active_template(project)?.iter().copied())
}

/// `" 1 0 1 ..."`: one space-prefixed digit per flag.
pub fn render_flags<I>(flags: I) -> String
where
    I: IntoIterator<Item = bool>,
{
    flags
        .into_iter()
        .map(|f| if f { " 1" } else { " 0" })
        .collect()
}
