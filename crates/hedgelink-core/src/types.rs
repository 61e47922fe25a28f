use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading-account login number as reported by the terminal.
pub type AccountId = u64;

/// Position ticket number on a terminal.
pub type Ticket = u64;

// ── VersusId ─────────────────────────────────────────────────────────────────

/// Short opaque identifier for a Versus workflow record.
///
/// Eight lowercase hex characters from four random bytes — short enough to
/// read aloud to an operator, unique enough for a single deployment's store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersusId(pub String);

impl VersusId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let bytes: [u8; 4] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VersusId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VersusId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for VersusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VersusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersusId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_eight_hex_chars() {
        let id = VersusId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ() {
        // Collision over a handful of draws would indicate a broken RNG wire-up.
        let a = VersusId::generate();
        let b = VersusId::generate();
        let c = VersusId::generate();
        assert!(a != b || b != c);
    }
}
