//! Enumerations used throughout the fillwatch system.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Side of a fill as reported by the feed.
///
/// The feed encodes buys as `"B"` (bid) and sells as `"A"` (ask). Anything
/// else is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
    Other(String),
}

impl Side {
    /// Decode the feed's side code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "B" => Self::Buy,
            "A" => Self::Sell,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "B"),
            Self::Sell => write!(f, "A"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_codes() {
        assert_eq!(Side::from_code("B"), Side::Buy);
        assert_eq!(Side::from_code("A"), Side::Sell);
        assert_eq!(Side::from_code("X"), Side::Other("X".into()));
        assert_eq!(Side::Other("X".into()).to_string(), "X");
    }
}
