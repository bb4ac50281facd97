//! Symbol identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alphabet used to populate spinning reels when the grid carries no symbols
pub const FALLBACK_ALPHABET: [&str; 6] = ["A", "K", "Q", "J", "10", "9"];

/// An opaque symbol as sent by the server (e.g. "HP1", "WILD", "SCATTER")
///
/// The blank symbol (empty string) marks an empty cell and only appears
/// on a cleared board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The empty-cell symbol
    pub fn blank() -> Self {
        Self(String::new())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable 32-bit FNV-1a hash, used to seed effect colours
    pub fn color_seed(&self) -> u32 {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in self.0.as_bytes() {
            hash ^= u32::from(*byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        hash
    }

    /// The fallback alphabet as symbols
    pub fn fallback_alphabet() -> Vec<Symbol> {
        FALLBACK_ALPHABET.iter().map(|s| Symbol::new(*s)).collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("·")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(name)
    }
}
