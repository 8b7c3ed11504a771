//! Call-to-action intents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The single action the user is asked to take next.
///
/// Variants are declared in their total priority order, most urgent first;
/// the derived `Ord` follows declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CtaIntent {
    PayNow,
    ContactSupport,
    FixLimit,
    Upgrade,
    None,
}

impl CtaIntent {
    /// Every intent, most urgent first.
    pub const ALL: [CtaIntent; 5] = [
        Self::PayNow,
        Self::ContactSupport,
        Self::FixLimit,
        Self::Upgrade,
        Self::None,
    ];

    /// Position in the priority order (0 = most urgent).
    pub fn rank(&self) -> u8 {
        match self {
            Self::PayNow => 0,
            Self::ContactSupport => 1,
            Self::FixLimit => 2,
            Self::Upgrade => 3,
            Self::None => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayNow => "PAY_NOW",
            Self::ContactSupport => "CONTACT_SUPPORT",
            Self::FixLimit => "FIX_LIMIT",
            Self::Upgrade => "UPGRADE",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for CtaIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_matches_ordering() {
        for pair in CtaIntent::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&CtaIntent::PayNow).unwrap(),
            "\"PAY_NOW\""
        );
        let back: CtaIntent = serde_json::from_str("\"CONTACT_SUPPORT\"").unwrap();
        assert_eq!(back, CtaIntent::ContactSupport);
        assert_eq!(CtaIntent::None.to_string(), "NONE");
    }
}
