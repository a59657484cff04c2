//! Capability bit-set advertised by backend adapters at registration time.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Declared features a backend supports, used for dispatch routing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        /// Can edit files in a workspace.
        const EDIT = 1 << 0;
        /// Can run terminal commands.
        const TERMINAL = 1 << 1;
        /// Can decompose tasks into plans.
        const PLANNER = 1 << 2;
        /// Can review diffs and artifacts.
        const REVIEW = 1 << 3;
        /// Can search code and documentation.
        const SEARCH = 1 << 4;
    }
}

impl Capabilities {
    /// Human-readable listing, for errors and logs.
    pub fn describe(&self) -> String {
        let mut names = Vec::new();
        if self.contains(Capabilities::EDIT) {
            names.push("edit");
        }
        if self.contains(Capabilities::TERMINAL) {
            names.push("terminal");
        }
        if self.contains(Capabilities::PLANNER) {
            names.push("planner");
        }
        if self.contains(Capabilities::REVIEW) {
            names.push("review");
        }
        if self.contains(Capabilities::SEARCH) {
            names.push("search");
        }
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join("+")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_subset_check() {
        let backend = Capabilities::EDIT | Capabilities::TERMINAL | Capabilities::SEARCH;
        assert!(backend.contains(Capabilities::EDIT));
        assert!(backend.contains(Capabilities::EDIT | Capabilities::TERMINAL));
        assert!(!backend.contains(Capabilities::PLANNER));
    }

    #[test]
    fn test_describe() {
        assert_eq!(Capabilities::empty().describe(), "none");
        assert_eq!(
            (Capabilities::EDIT | Capabilities::REVIEW).describe(),
            "edit+review"
        );
    }
}
