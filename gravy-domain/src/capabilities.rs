//! The capability bitset (§4.8 glossary: "a coarse permission tag
//! attached to each operation and to each account/addon as a bitset").

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// A bitset of capability tags, stored as a plain integer column
/// (`authorized_capabilities`/`connected_capabilities`/`supported_capabilities`)
/// rather than a join table — the set rarely grows past a handful of bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const ACCESS: Self = Self(1 << 0);
    pub const UPDATE: Self = Self(1 << 1);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether `self` (read as a subset-to-check) is entirely contained
    /// within `superset` — the shape the §4.8 invariants use:
    /// `account.authorized_capabilities ⊆ service.supported_capabilities`.
    pub fn is_subset_of(&self, superset: Self) -> bool {
        self.0 & !superset.0 == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn as_i32(&self) -> i32 {
        self.0 as i32
    }

    pub fn from_i32(bits: i32) -> Self {
        Self(bits as u8)
    }
}

impl BitOr for Capabilities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_check_passes_for_equal_sets() {
        assert!(Capabilities::ACCESS.is_subset_of(Capabilities::ACCESS));
    }

    #[test]
    fn test_subset_check_fails_when_bit_missing() {
        let account_caps = Capabilities::ACCESS | Capabilities::UPDATE;
        assert!(!account_caps.is_subset_of(Capabilities::ACCESS));
        assert!(Capabilities::ACCESS.is_subset_of(account_caps));
    }

    #[test]
    fn test_none_is_subset_of_everything() {
        assert!(Capabilities::NONE.is_subset_of(Capabilities::ACCESS));
    }
}
