//! Card Kernel — Projects
//!
//! The installations sharing one card numbering. Fixed domain facts.

use crate::error::CardError;

/// Enumerated project identifiers, in template-table order.
pub const PROJECT_IDS: [i32; 3] = [2, 3, 4];

/// The project whose descriptions are authoritative.
pub const MASTER_PROJECT: i32 = PROJECT_IDS[0];

/// Number of sibling records a complete physical card has.
pub const SIBLINGS_PER_CARD: usize = PROJECT_IDS.len();

/// Position of `project` within `PROJECT_IDS`.
pub fn project_index(project: i32) -> Result<usize, CardError> {
    PROJECT_IDS
        .iter()
        .position(|&p| p == project)
        .ok_or(CardError::InvalidProject(project))
}

pub fn is_master(project: i32) -> bool {
    project == MASTER_PROJECT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_index_ok() {
        assert_eq!(project_index(2), Ok(0));
        assert_eq!(project_index(3), Ok(1));
        assert_eq!(project_index(4), Ok(2));
    }

    #[test]
    fn test_project_index_rejects_unknown() {
        assert_eq!(project_index(1), Err(CardError::InvalidProject(1)));
        assert_eq!(project_index(5), Err(CardError::InvalidProject(5)));
        assert_eq!(project_index(-2), Err(CardError::InvalidProject(-2)));
    }

    #[test]
    fn test_master_is_first_project() {
        assert!(is_master(2));
        assert!(!is_master(3));
        assert!(!is_master(4));
    }
}
