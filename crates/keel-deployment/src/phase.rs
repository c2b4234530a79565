//! Deployment phases
//!
//! Phases are plain numbers; processors run in ascending phase order. The
//! named constants leave gaps so collaborators can slot their own phases in
//! between.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(pub u32);

impl Phase {
    /// Mount the deployment content and discover its structure
    pub const STRUCTURE: Phase = Phase(100);
    /// Parse descriptors
    pub const PARSE: Phase = Phase(200);
    pub const DEPENDENCIES: Phase = Phase(300);
    pub const CONFIGURE: Phase = Phase(400);
    pub const POST_MODULE: Phase = Phase(500);
    /// Install runtime services
    pub const INSTALL: Phase = Phase(600);

    pub fn value(self) -> u32 {
        self.0
    }

    fn label(self) -> Option<&'static str> {
        match self {
            Self::STRUCTURE => Some("STRUCTURE"),
            Self::PARSE => Some("PARSE"),
            Self::DEPENDENCIES => Some("DEPENDENCIES"),
            Self::CONFIGURE => Some("CONFIGURE"),
            Self::POST_MODULE => Some("POST_MODULE"),
            Self::INSTALL => Some("INSTALL"),
            _ => None,
        }
    }
}

impl From<u32> for Phase {
    fn from(value: u32) -> Self {
        Phase(value)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => write!(f, "{}({})", label, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_and_display() {
        assert!(Phase::STRUCTURE < Phase::PARSE);
        assert!(Phase(150) > Phase::STRUCTURE && Phase(150) < Phase::PARSE);
        assert_eq!(Phase::INSTALL.to_string(), "INSTALL(600)");
        assert_eq!(Phase(42).to_string(), "42");
    }
}
